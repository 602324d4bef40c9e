//! Error handling for the Stone Stock platform
//!
//! Provides consistent error responses in Portuguese and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::import::ImportError;
use shared::LedgerError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_pt: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_pt: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_pt: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    // External service errors
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock { .. } => AppError::InsufficientStock(err.to_string()),
            LedgerError::AlreadyCancelled => AppError::InvalidStateTransition(err.to_string()),
            other => AppError::ValidationError(other.to_string()),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        AppError::Spreadsheet(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<&&str> = field_errors.keys().collect();
        fields.sort();
        match fields.first() {
            Some(field) => {
                let message = field_errors
                    .get(**field)
                    .and_then(|errs| errs.first())
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::Validation {
                    field: field.to_string(),
                    message_pt: format!("Campo inválido: {}", field),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        AppError::Spreadsheet(err.to_string())
    }
}

impl From<calamine::XlsxError> for AppError {
    fn from(err: calamine::XlsxError) -> Self {
        AppError::Spreadsheet(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Spreadsheet(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Internal(format!("Workbook generation failed: {}", err))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_pt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_)
            | AppError::InsufficientStock(_)
            | AppError::Spreadsheet(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        let (code, message_en, message_pt, field) = match self {
            AppError::InvalidCredentials => (
                "INVALID_CREDENTIALS",
                "Invalid email or password".to_string(),
                "E-mail ou palavra-passe inválidos".to_string(),
                None,
            ),
            AppError::InvalidToken => (
                "INVALID_TOKEN",
                "Invalid token".to_string(),
                "Token inválido".to_string(),
                None,
            ),
            AppError::InsufficientPermissions => (
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action".to_string(),
                "Não tem permissão para realizar esta ação".to_string(),
                None,
            ),
            AppError::Unauthorized { message, message_pt } => {
                ("UNAUTHORIZED", message.clone(), message_pt.clone(), None)
            }
            AppError::Validation {
                field,
                message,
                message_pt,
            } => (
                "VALIDATION_ERROR",
                message.clone(),
                message_pt.clone(),
                Some(field.clone()),
            ),
            AppError::ValidationError(msg) => (
                "VALIDATION_ERROR",
                msg.clone(),
                format!("Dados inválidos: {}", msg),
                None,
            ),
            AppError::DuplicateEntry(field) => (
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
                format!("Já existe um registo com este {}", field),
                Some(field.clone()),
            ),
            AppError::Conflict {
                resource,
                message,
                message_pt,
            } => (
                "CONFLICT",
                message.clone(),
                message_pt.clone(),
                Some(resource.clone()),
            ),
            AppError::NotFound(resource) => (
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("{} não encontrado", resource),
                None,
            ),
            AppError::InvalidStateTransition(msg) => (
                "INVALID_STATE_TRANSITION",
                msg.clone(),
                format!("Alteração de estado inválida: {}", msg),
                None,
            ),
            AppError::InsufficientStock(msg) => (
                "INSUFFICIENT_STOCK",
                msg.clone(),
                format!("Stock insuficiente: {}", msg),
                None,
            ),
            AppError::Spreadsheet(msg) => (
                "SPREADSHEET_ERROR",
                msg.clone(),
                format!("Erro na folha de cálculo: {}", msg),
                None,
            ),
            AppError::PayloadTooLarge(msg) => (
                "PAYLOAD_TOO_LARGE",
                msg.clone(),
                format!("Ficheiro demasiado grande: {}", msg),
                None,
            ),
            AppError::StorageError(msg) => (
                "STORAGE_ERROR",
                format!("Storage error: {}", msg),
                format!("Erro no armazenamento: {}", msg),
                None,
            ),
            AppError::ExternalService(msg) => (
                "EXTERNAL_SERVICE_ERROR",
                format!("External service error: {}", msg),
                format!("Erro num serviço externo: {}", msg),
                None,
            ),
            AppError::Configuration(msg) => (
                "CONFIGURATION_ERROR",
                format!("Configuration error: {}", msg),
                format!("Erro de configuração: {}", msg),
                None,
            ),
            AppError::DatabaseError(_) => (
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                "Ocorreu um erro na base de dados".to_string(),
                None,
            ),
            AppError::Internal(msg) => (
                "INTERNAL_ERROR",
                msg.clone(),
                "Erro interno do servidor".to_string(),
                None,
            ),
            AppError::InternalError(_) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                "Erro interno do servidor".to_string(),
                None,
            ),
        };

        ErrorDetail {
            code: code.to_string(),
            message_en,
            message_pt,
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request failed: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let err: AppError = LedgerError::InsufficientStock {
            location_id: Uuid::nil(),
            available: Decimal::ONE,
            requested: Decimal::TEN,
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: AppError = LedgerError::SameLocation.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = LedgerError::AlreadyCancelled.into();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));
    }

    #[test]
    fn import_errors_are_unprocessable() {
        let err: AppError = ImportError::MissingColumn("ID_MM").into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.detail().code, "SPREADSHEET_ERROR");
    }
}
