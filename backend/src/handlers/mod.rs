//! HTTP handlers

mod audit;
mod auth;
mod customer;
mod export;
mod health;
mod import;
mod location;
mod movement;
mod product;
mod profile;
mod stock;
mod storage;
mod user;

pub use audit::*;
pub use auth::*;
pub use customer::*;
pub use export::*;
pub use health::*;
pub use import::*;
pub use location::*;
pub use movement::*;
pub use product::*;
pub use profile::*;
pub use stock::*;
pub use storage::*;
pub use user::*;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

use crate::error::{AppError, AppResult};

/// A file received in a multipart form
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::ValidationError(err.body_text())
    }
}

/// Read the `file` field of a multipart form
pub(crate) async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> AppResult<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit",
                bytes.len(),
                max_bytes
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation {
                field: "file".to_string(),
                message: "The uploaded file is empty".to_string(),
                message_pt: "O ficheiro enviado está vazio".to_string(),
            });
        }

        return Ok(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::Validation {
        field: "file".to_string(),
        message: "A file field named 'file' is required".to_string(),
        message_pt: "É necessário enviar um ficheiro no campo 'file'".to_string(),
    })
}

/// Image extension from the file name, then the declared content type
pub(crate) fn image_extension(upload: &Upload) -> AppResult<&'static str> {
    shared::storage::extension_from_filename(&upload.filename)
        .or_else(|| {
            upload
                .content_type
                .as_deref()
                .and_then(shared::storage::extension_from_content_type)
        })
        .ok_or_else(|| AppError::Validation {
            field: "file".to_string(),
            message: "Only JPG, PNG and WebP images are accepted".to_string(),
            message_pt: "Só são aceites imagens JPG, PNG e WebP".to_string(),
        })
}
