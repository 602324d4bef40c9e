//! Object download handler

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use shared::storage::{content_type_for, Bucket};

use crate::error::AppError;
use crate::services::StorageService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// Serve a stored file; private buckets need a valid signature
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bucket: Bucket = bucket
        .parse()
        .map_err(|_| AppError::NotFound("Bucket".to_string()))?;
    let key = key.trim_start_matches('/');
    let storage = StorageService::new(&state.config.storage);

    if !bucket.is_public() {
        let valid = match (query.expires, query.signature.as_deref()) {
            (Some(expires), Some(signature)) => {
                storage.verify(bucket, key, expires, signature, Utc::now().timestamp())
            }
            _ => false,
        };
        if !valid {
            return Err(AppError::Unauthorized {
                message: "Missing or expired link signature".to_string(),
                message_pt: "A assinatura do link está em falta ou expirou".to_string(),
            });
        }
    }

    let bytes = storage.read(bucket, key).await?;
    let ext = key.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();

    Ok(([(header::CONTENT_TYPE, content_type_for(ext))], bytes))
}
