//! Own profile handlers

use axum::extract::{Multipart, State};
use axum::Json;

use super::{image_extension, read_upload};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::profile::UpdateProfileInput;
use crate::services::{ProfileService, StorageService};
use crate::AppState;
use shared::storage::{avatar_key, Bucket};
use shared::Profile;

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Profile>, AppError> {
    let service = ProfileService::new(state.db.clone());
    Ok(Json(service.get(user.company_id, user.user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdateProfileInput>,
) -> Result<Json<Profile>, AppError> {
    let service = ProfileService::new(state.db.clone());
    Ok(Json(service.update(user.company_id, user.user_id, input).await?))
}

/// Replace the avatar image
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<Profile>, AppError> {
    let upload = read_upload(multipart, state.config.storage.max_upload_bytes).await?;
    let ext = image_extension(&upload)?;

    let storage = StorageService::new(&state.config.storage);
    let stored = storage
        .put_overwrite(Bucket::Avatars, &avatar_key(user.user_id, ext), &upload.bytes)
        .await?;

    let service = ProfileService::new(state.db.clone());
    Ok(Json(
        service
            .set_avatar_url(user.company_id, user.user_id, &stored.url)
            .await?,
    ))
}
