//! Photo and avatar object storage on the local filesystem
//!
//! Objects live under `{root}/{bucket}/{key}`. Public buckets are served by plain URL;
//! the HD bucket only through URLs signed with HMAC-SHA256 that expire.

use std::io::ErrorKind;
use std::path::PathBuf;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use shared::storage::{is_safe_key, Bucket, MAX_UPLOAD_ATTEMPTS};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct StorageService {
    root: PathBuf,
    public_base_url: String,
    signing_secret: String,
    signed_url_ttl_secs: i64,
}

/// Where an upload ended up
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub bucket: Bucket,
    pub key: String,
    /// Persistent URL; for private buckets it must be signed before use
    pub url: String,
}

impl StorageService {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signing_secret: config.signing_secret.clone(),
            signed_url_ttl_secs: config.signed_url_ttl_secs,
        }
    }

    fn path_for(&self, bucket: Bucket, key: &str) -> AppResult<PathBuf> {
        if !is_safe_key(key) {
            return Err(AppError::ValidationError(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(bucket.as_str()).join(key))
    }

    /// Store under the first free key produced by `key_for(attempt)`
    pub async fn put_new<F>(&self, bucket: Bucket, key_for: F, bytes: &[u8]) -> AppResult<StoredObject>
    where
        F: Fn(u32) -> String,
    {
        for attempt in 0..MAX_UPLOAD_ATTEMPTS {
            let key = key_for(attempt);
            let path = self.path_for(bucket, &key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
            }

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match file {
                Ok(mut file) => {
                    file.write_all(bytes).await.map_err(storage_error)?;
                    file.flush().await.map_err(storage_error)?;
                    tracing::debug!(%bucket, %key, size = bytes.len(), "object stored");
                    return Ok(self.stored(bucket, key));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(%bucket, %key, attempt, "object key taken, retrying");
                }
                Err(e) => return Err(storage_error(e)),
            }
        }

        tracing::warn!(%bucket, attempts = MAX_UPLOAD_ATTEMPTS, "no free object key");
        Err(AppError::Conflict {
            resource: "storage".to_string(),
            message: format!("No free file name after {} attempts", MAX_UPLOAD_ATTEMPTS),
            message_pt: format!(
                "Não foi encontrado um nome de ficheiro livre após {} tentativas",
                MAX_UPLOAD_ATTEMPTS
            ),
        })
    }

    /// Store under a fixed key, replacing any previous object
    pub async fn put_overwrite(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> AppResult<StoredObject> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(storage_error)?;
        Ok(self.stored(bucket, key.to_string()))
    }

    pub async fn read(&self, bucket: Bucket, key: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound("File".to_string())),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn stored(&self, bucket: Bucket, key: String) -> StoredObject {
        StoredObject {
            url: self.object_url(bucket, &key),
            bucket,
            key,
        }
    }

    pub fn object_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/storage/{}/{}", self.public_base_url, bucket, key)
    }

    fn signature(&self, bucket: Bucket, key: &str, expires: i64) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| AppError::Configuration(format!("Invalid signing secret: {}", e)))?;
        mac.update(format!("{}/{}:{}", bucket, key, expires).as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Time-limited URL for any bucket
    pub fn signed_url(&self, bucket: Bucket, key: &str) -> AppResult<String> {
        let expires = Utc::now().timestamp() + self.signed_url_ttl_secs;
        Ok(format!(
            "{}?expires={}&signature={}",
            self.object_url(bucket, key),
            expires,
            self.signature(bucket, key, expires)?
        ))
    }

    /// Sign a persistent URL previously returned by this service
    pub fn sign_stored_url(&self, url: &str) -> AppResult<Option<String>> {
        let Some(path) = url.strip_prefix(&format!("{}/storage/", self.public_base_url)) else {
            return Ok(None);
        };
        let Some((bucket, key)) = path.split_once('/') else {
            return Ok(None);
        };
        match bucket.parse::<Bucket>() {
            Ok(bucket) => self.signed_url(bucket, key).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Check a signature at time `now` (unix seconds)
    pub fn verify(&self, bucket: Bucket, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.signing_secret.as_bytes()) else {
            return false;
        };
        mac.update(format!("{}/{}:{}", bucket, key, expires).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}

fn storage_error(err: std::io::Error) -> AppError {
    AppError::StorageError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::storage::product_photo_key;

    fn service(root: &std::path::Path) -> StorageService {
        StorageService::new(&StorageConfig {
            root: root.to_string_lossy().into_owned(),
            public_base_url: "http://localhost:3000/api/v1/".to_string(),
            signing_secret: "test-secret".to_string(),
            signed_url_ttl_secs: 600,
            max_upload_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn collisions_get_suffixed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());

        let first = storage
            .put_new(Bucket::Products, |n| product_photo_key("MM 1", "jpg", n), b"a")
            .await
            .unwrap();
        let second = storage
            .put_new(Bucket::Products, |n| product_photo_key("MM 1", "jpg", n), b"b")
            .await
            .unwrap();

        assert_eq!(first.key, "MM-1.jpg");
        assert_eq!(second.key, "MM-1_1.jpg");
        assert_eq!(first.url, "http://localhost:3000/api/v1/storage/produtos/MM-1.jpg");
        assert_eq!(storage.read(Bucket::Products, "MM-1.jpg").await.unwrap(), b"a");
        assert_eq!(storage.read(Bucket::Products, "MM-1_1.jpg").await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());

        storage
            .put_new(Bucket::Products, |_| "fixed.jpg".to_string(), b"a")
            .await
            .unwrap();
        let err = storage
            .put_new(Bucket::Products, |_| "fixed.jpg".to_string(), b"b")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn overwrite_and_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());

        storage.put_overwrite(Bucket::Avatars, "u/avatar.png", b"1").await.unwrap();
        storage.put_overwrite(Bucket::Avatars, "u/avatar.png", b"2").await.unwrap();
        assert_eq!(storage.read(Bucket::Avatars, "u/avatar.png").await.unwrap(), b"2");

        assert!(matches!(
            storage.read(Bucket::Avatars, "nope.png").await,
            Err(AppError::NotFound(_))
        ));
        assert!(storage.read(Bucket::Avatars, "../secret").await.is_err());
    }

    #[test]
    fn signatures_expire_and_bind_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());
        let now = 1_700_000_000;
        let expires = now + 60;
        let sig = storage.signature(Bucket::ProductsHd, "MM1_hd.jpg", expires).unwrap();

        assert!(storage.verify(Bucket::ProductsHd, "MM1_hd.jpg", expires, &sig, now));
        assert!(!storage.verify(Bucket::ProductsHd, "MM1_hd.jpg", expires, &sig, expires + 1));
        assert!(!storage.verify(Bucket::ProductsHd, "MM2_hd.jpg", expires, &sig, now));
        assert!(!storage.verify(Bucket::ProductsHd, "MM1_hd.jpg", expires, "garbage!", now));
    }

    #[test]
    fn stored_urls_can_be_signed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());
        let url = storage.object_url(Bucket::ProductsHd, "MM1_hd.jpg");

        let signed = storage.sign_stored_url(&url).unwrap().unwrap();
        assert!(signed.starts_with(&format!("{}?expires=", url)));
        assert!(storage.sign_stored_url("https://elsewhere/x.jpg").unwrap().is_none());
    }
}
