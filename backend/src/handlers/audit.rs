//! Audit log handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::types::{PaginatedResponse, Pagination};
use shared::{Action, AuditEntry, Resource};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::audit::AuditFilter;
use crate::services::AuditService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListAuditQuery {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_audit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<PaginatedResponse<AuditEntry>>, AppError> {
    user.require(Resource::Audit, Action::View)?;

    let filter = AuditFilter {
        action: query.action,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        user_id: query.user_id,
        from: query.from,
        to: query.to,
    };
    let pagination = Pagination::new(query.page, query.per_page);

    let service = AuditService::new(state.db.clone());
    Ok(Json(service.list(user.company_id, &filter, pagination).await?))
}
