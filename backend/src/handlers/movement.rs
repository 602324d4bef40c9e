//! Movement handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::types::{PaginatedResponse, Pagination};
use shared::{Action, Movement, MovementKind, MovementStatus, Resource};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::movement::{
    CancelMovementInput, CreateMovementInput, MovementDetails, MovementFilter,
};
use crate::services::MovementService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListMovementsQuery {
    pub kind: Option<MovementKind>,
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<MovementStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListMovementsQuery>,
) -> Result<Json<PaginatedResponse<MovementDetails>>, AppError> {
    user.require(Resource::Movement, Action::View)?;

    let filter = MovementFilter {
        kind: query.kind,
        product_id: query.product_id,
        location_id: query.location_id,
        customer_id: query.customer_id,
        status: query.status,
        from: query.from,
        to: query.to,
    };
    let pagination = Pagination::new(query.page, query.per_page);

    let service = MovementService::new(state.db.clone());
    Ok(Json(service.list(user.company_id, &filter, pagination).await?))
}

pub async fn get_movement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> Result<Json<MovementDetails>, AppError> {
    user.require(Resource::Movement, Action::View)?;

    let service = MovementService::new(state.db.clone());
    Ok(Json(service.get(user.company_id, movement_id).await?))
}

/// Record an entry, transfer or exit
pub async fn create_movement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateMovementInput>,
) -> Result<(StatusCode, Json<Movement>), AppError> {
    user.require(Resource::Movement, Action::Create)?;

    let service = MovementService::new(state.db.clone());
    let movement = service.create(user.company_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Cancel a movement, reversing its stock effect
pub async fn cancel_movement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<CancelMovementInput>,
) -> Result<Json<Movement>, AppError> {
    user.require(Resource::Movement, Action::Cancel)?;

    let service = MovementService::new(state.db.clone());
    Ok(Json(
        service
            .cancel(user.company_id, user.user_id, movement_id, input)
            .await?,
    ))
}
