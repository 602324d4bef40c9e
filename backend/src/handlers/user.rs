//! Company user administration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Profile, Resource};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, UpdateUserInput};
use crate::services::UserService;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Profile>>, AppError> {
    user.require(Resource::User, Action::View)?;

    let service = UserService::new(state.db.clone());
    Ok(Json(service.list(user.company_id).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    user.require(Resource::User, Action::View)?;

    let service = UserService::new(state.db.clone());
    Ok(Json(service.get(user.company_id, user_id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    user.require(Resource::User, Action::Manage)?;

    let service = UserService::new(state.db.clone());
    let created = service.create(user.company_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Change name, role or active flag
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<Profile>, AppError> {
    user.require(Resource::User, Action::Manage)?;

    let service = UserService::new(state.db.clone());
    Ok(Json(
        service
            .update(user.company_id, user.user_id, user_id, input)
            .await?,
    ))
}
