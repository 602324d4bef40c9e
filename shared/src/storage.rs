//! Object storage buckets and key naming

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ParseEnumError;

/// Upload attempts before giving up on finding a free key
pub const MAX_UPLOAD_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "avatars")]
    Avatars,
    #[serde(rename = "produtos")]
    Products,
    #[serde(rename = "produtos_hd")]
    ProductsHd,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Avatars, Bucket::Products, Bucket::ProductsHd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Avatars => "avatars",
            Bucket::Products => "produtos",
            Bucket::ProductsHd => "produtos_hd",
        }
    }

    /// HD originals are only served through signed URLs
    pub fn is_public(&self) -> bool {
        !matches!(self, Bucket::ProductsHd)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("bucket", s))
    }
}

/// Lowercased image extension, `jpeg` folded into `jpg`
pub fn normalize_extension(ext: &str) -> Option<&'static str> {
    match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        _ => None,
    }
}

pub fn extension_from_filename(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    normalize_extension(ext)
}

pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub fn content_type_for(ext: &str) -> &'static str {
    match normalize_extension(ext) {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// IDMM as used inside object keys
pub fn key_segment(idmm: &str) -> String {
    idmm.trim()
        .chars()
        .map(|c| if c == '/' || c.is_whitespace() { '-' } else { c })
        .collect()
}

fn with_attempt(stem: &str, ext: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{}.{}", stem, ext)
    } else {
        format!("{}_{}.{}", stem, attempt, ext)
    }
}

pub fn avatar_key(user_id: Uuid, ext: &str) -> String {
    format!("{}/avatar.{}", user_id, ext)
}

/// `IDMM.jpg`, then `IDMM_1.jpg`, `IDMM_2.jpg`, ... on collision
pub fn product_photo_key(idmm: &str, ext: &str, attempt: u32) -> String {
    with_attempt(&key_segment(idmm), ext, attempt)
}

pub fn product_hd_key(idmm: &str, ext: &str, attempt: u32) -> String {
    with_attempt(&format!("{}_hd", key_segment(idmm)), ext, attempt)
}

pub fn parga_photo_key(idmm: &str, number: i32, ext: &str, attempt: u32) -> String {
    with_attempt(&format!("{}/parga_{}", key_segment(idmm), number), ext, attempt)
}

/// Reject keys that could escape the bucket
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key.split('/').all(|part| !part.is_empty() && part != "." && part != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_naming() {
        assert_eq!(product_photo_key("MM 12/3", "jpg", 0), "MM-12-3.jpg");
        assert_eq!(product_photo_key("MM1", "jpg", 2), "MM1_2.jpg");
        assert_eq!(product_hd_key("MM1", "png", 0), "MM1_hd.png");
        assert_eq!(product_hd_key("MM1", "png", 1), "MM1_hd_1.png");
        assert_eq!(parga_photo_key("MM1", 4, "webp", 0), "MM1/parga_4.webp");
    }

    #[test]
    fn extensions() {
        assert_eq!(normalize_extension("JPEG"), Some("jpg"));
        assert_eq!(extension_from_filename("foto.final.PNG"), Some("png"));
        assert_eq!(extension_from_filename("foto.gif"), None);
        assert_eq!(content_type_for("jpg"), "image/jpeg");
    }

    #[test]
    fn buckets_and_keys() {
        assert_eq!("produtos_hd".parse::<Bucket>().unwrap(), Bucket::ProductsHd);
        assert!(!Bucket::ProductsHd.is_public());
        assert!(Bucket::Products.is_public());
        assert!(is_safe_key("MM1/parga_1.jpg"));
        assert!(!is_safe_key("../secret"));
        assert!(!is_safe_key("/etc/passwd"));
    }
}
