//! Spreadsheet import handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use shared::{Action, Resource};

use super::read_upload;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::import::{ImportPreview, ImportResult};
use crate::services::{ImportService, StorageService};
use crate::AppState;

fn import_service(state: &AppState) -> ImportService {
    ImportService::new(
        state.db.clone(),
        state.config.import.clone(),
        StorageService::new(&state.config.storage),
    )
}

/// Validate a sheet and show what a commit would do
pub async fn preview_import(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<ImportPreview>, AppError> {
    user.require(Resource::Import, Action::Create)?;

    let upload = read_upload(multipart, state.config.storage.max_upload_bytes).await?;
    let preview = import_service(&state)
        .preview(user.company_id, &upload.filename, &upload.bytes)
        .await?;
    Ok(Json(preview))
}

pub async fn commit_import(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<ImportResult>, AppError> {
    user.require(Resource::Import, Action::Create)?;

    let upload = read_upload(multipart, state.config.storage.max_upload_bytes).await?;
    let result = import_service(&state)
        .commit(user.company_id, user.user_id, &upload.filename, &upload.bytes)
        .await?;
    Ok(Json(result))
}
