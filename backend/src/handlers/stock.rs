//! Stock handlers

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{Action, Resource, StockEntry};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::stock::{StockFilter, StockSummary};
use crate::services::StockService;
use crate::AppState;

pub async fn list_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<StockFilter>,
) -> Result<Json<Vec<StockEntry>>, AppError> {
    user.require(Resource::Stock, Action::View)?;

    let service = StockService::new(state.db.clone());
    Ok(Json(service.list(user.company_id, &filter).await?))
}

/// Totals and valuation per location
pub async fn stock_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StockSummary>, AppError> {
    user.require(Resource::Stock, Action::View)?;

    let service = StockService::new(state.db.clone());
    Ok(Json(service.summary(user.company_id).await?))
}
