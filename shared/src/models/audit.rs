//! Audit trail models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded action on a tenant-owned entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    PargaCreate,
    PargaUpdate,
    PargaDelete,
    LocationCreate,
    LocationUpdate,
    LocationDelete,
    CustomerCreate,
    CustomerUpdate,
    CustomerDelete,
    MovementCreate,
    MovementCancel,
    ImportCommit,
    UserCreate,
    UserUpdate,
    PhotoUpload,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ProductCreate => "product.create",
            AuditAction::ProductUpdate => "product.update",
            AuditAction::ProductDelete => "product.delete",
            AuditAction::PargaCreate => "parga.create",
            AuditAction::PargaUpdate => "parga.update",
            AuditAction::PargaDelete => "parga.delete",
            AuditAction::LocationCreate => "location.create",
            AuditAction::LocationUpdate => "location.update",
            AuditAction::LocationDelete => "location.delete",
            AuditAction::CustomerCreate => "customer.create",
            AuditAction::CustomerUpdate => "customer.update",
            AuditAction::CustomerDelete => "customer.delete",
            AuditAction::MovementCreate => "movement.create",
            AuditAction::MovementCancel => "movement.cancel",
            AuditAction::ImportCommit => "import.commit",
            AuditAction::UserCreate => "user.create",
            AuditAction::UserUpdate => "user.update",
            AuditAction::PhotoUpload => "photo.upload",
        }
    }

    /// Entity type recorded alongside the action
    pub fn entity_type(&self) -> &'static str {
        self.as_str().split('.').next().unwrap_or("unknown")
    }
}
