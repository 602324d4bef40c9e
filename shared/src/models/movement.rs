//! Stock movement (movimento) models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;
use crate::ledger::{LedgerError, MovementDraft};

/// Kind of stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock arriving at a location (entrada)
    Entry,
    /// Stock moved between two locations (transferência)
    Transfer,
    /// Stock leaving the company (saída)
    Exit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entry => "entry",
            MovementKind::Transfer => "transfer",
            MovementKind::Exit => "exit",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(MovementKind::Entry),
            "transfer" => Ok(MovementKind::Transfer),
            "exit" => Ok(MovementKind::Exit),
            other => Err(ParseEnumError::new("movement kind", other)),
        }
    }
}

/// Lifecycle of a movement: active until cancelled, never back
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    #[default]
    Active,
    Cancelled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Active => "active",
            MovementStatus::Cancelled => "cancelled",
        }
    }

    /// Transition to cancelled
    pub fn cancel(self) -> Result<MovementStatus, LedgerError> {
        match self {
            MovementStatus::Active => Ok(MovementStatus::Cancelled),
            MovementStatus::Cancelled => Err(LedgerError::AlreadyCancelled),
        }
    }
}

impl FromStr for MovementStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MovementStatus::Active),
            "cancelled" => Ok(MovementStatus::Cancelled),
            other => Err(ParseEnumError::new("movement status", other)),
        }
    }
}

/// A recorded stock movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub company_id: Uuid,
    pub kind: MovementKind,
    pub product_id: Uuid,
    pub origin_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub customer_id: Option<Uuid>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub movement_date: NaiveDate,
    pub status: MovementStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub import_batch_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// The stock-affecting part of this movement
    pub fn draft(&self) -> MovementDraft {
        MovementDraft {
            kind: self.kind,
            product_id: self.product_id,
            origin_location_id: self.origin_location_id,
            destination_location_id: self.destination_location_id,
            quantity: self.quantity,
            customer_id: self.customer_id,
        }
    }
}
