//! Company (tenant) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A company using the platform; every tenant-owned row belongs to one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Short code used at login (e.g., "MMR")
    pub code: String,
    pub nif: Option<String>,
    pub created_at: DateTime<Utc>,
}
