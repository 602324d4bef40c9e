//! Export handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use shared::{Action, Resource};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::export::ExportFormat;
use crate::services::ExportService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    /// Only rows that import back unchanged
    #[serde(default)]
    pub reimportable: bool,
}

/// Download products and stock as a spreadsheet
pub async fn export_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Resource::Export, Action::View)?;

    let service = ExportService::new(state.db.clone());
    let (bytes, filename) = service
        .products(user.company_id, query.format, query.reimportable)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, query.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}
