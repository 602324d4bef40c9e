//! Storage location handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Action, Location, Resource, StockEntry};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::location::{CreateLocationInput, LocationWithStock, UpdateLocationInput};
use crate::services::{LocationService, StockService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListLocationsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_locations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListLocationsQuery>,
) -> Result<Json<Vec<LocationWithStock>>, AppError> {
    user.require(Resource::Location, Action::View)?;

    let service = LocationService::new(state.db.clone());
    Ok(Json(service.list(user.company_id, query.include_inactive).await?))
}

pub async fn get_location(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location_id): Path<Uuid>,
) -> Result<Json<Location>, AppError> {
    user.require(Resource::Location, Action::View)?;

    let service = LocationService::new(state.db.clone());
    Ok(Json(service.get(user.company_id, location_id).await?))
}

/// Stock held at one location
pub async fn get_location_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location_id): Path<Uuid>,
) -> Result<Json<Vec<StockEntry>>, AppError> {
    user.require(Resource::Stock, Action::View)?;

    LocationService::new(state.db.clone())
        .get(user.company_id, location_id)
        .await?;
    let service = StockService::new(state.db.clone());
    Ok(Json(service.for_location(user.company_id, location_id).await?))
}

pub async fn create_location(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateLocationInput>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    user.require(Resource::Location, Action::Create)?;

    let service = LocationService::new(state.db.clone());
    let location = service.create(user.company_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_location(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location_id): Path<Uuid>,
    Json(input): Json<UpdateLocationInput>,
) -> Result<Json<Location>, AppError> {
    user.require(Resource::Location, Action::Edit)?;

    let service = LocationService::new(state.db.clone());
    Ok(Json(
        service
            .update(user.company_id, user.user_id, location_id, input)
            .await?,
    ))
}

pub async fn delete_location(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Resource::Location, Action::Delete)?;

    let service = LocationService::new(state.db.clone());
    service.delete(user.company_id, user.user_id, location_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
