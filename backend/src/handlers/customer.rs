//! Customer handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::types::{PaginatedResponse, Pagination};
use shared::{Action, Customer, Resource};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::customer::CustomerInput;
use crate::services::CustomerService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<PaginatedResponse<Customer>>, AppError> {
    user.require(Resource::Customer, Action::View)?;

    let service = CustomerService::new(state.db.clone());
    let pagination = Pagination::new(query.page, query.per_page);
    Ok(Json(
        service
            .list(user.company_id, query.search.as_deref(), pagination)
            .await?,
    ))
}

pub async fn get_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    user.require(Resource::Customer, Action::View)?;

    let service = CustomerService::new(state.db.clone());
    Ok(Json(service.get(user.company_id, customer_id).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    user.require(Resource::Customer, Action::Create)?;

    let service = CustomerService::new(state.db.clone());
    let customer = service.create(user.company_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<Customer>, AppError> {
    user.require(Resource::Customer, Action::Edit)?;

    let service = CustomerService::new(state.db.clone());
    Ok(Json(
        service
            .update(user.company_id, user.user_id, customer_id, input)
            .await?,
    ))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Resource::Customer, Action::Delete)?;

    let service = CustomerService::new(state.db.clone());
    service.delete(user.company_id, user.user_id, customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
