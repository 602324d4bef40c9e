//! Stock bookkeeping for movements
//!
//! Every movement turns into per-location deltas. Cancelling a movement applies the
//! negated deltas. A balance may never go below zero; all deltas of one movement are
//! applied together or not at all.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::MovementKind;

/// Bookkeeping errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("{0} movement requires an origin location")]
    MissingOrigin(MovementKind),

    #[error("{0} movement requires a destination location")]
    MissingDestination(MovementKind),

    #[error("{0} movement cannot have an origin location")]
    UnexpectedOrigin(MovementKind),

    #[error("{0} movement cannot have a destination location")]
    UnexpectedDestination(MovementKind),

    #[error("{0} movement cannot reference a customer")]
    UnexpectedCustomer(MovementKind),

    #[error("origin and destination must be different locations")]
    SameLocation,

    #[error("insufficient stock at location {location_id}: available {available}, requested {requested}")]
    InsufficientStock {
        location_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("movement is already cancelled")]
    AlreadyCancelled,
}

/// Change in stock at one location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub location_id: Uuid,
    pub delta: Decimal,
}

/// The stock-affecting fields of a movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub kind: MovementKind,
    pub product_id: Uuid,
    pub origin_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub customer_id: Option<Uuid>,
}

impl MovementDraft {
    /// Check the location/customer shape required by the movement kind
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveQuantity);
        }

        match self.kind {
            MovementKind::Entry => {
                if self.destination_location_id.is_none() {
                    return Err(LedgerError::MissingDestination(self.kind));
                }
                if self.origin_location_id.is_some() {
                    return Err(LedgerError::UnexpectedOrigin(self.kind));
                }
                if self.customer_id.is_some() {
                    return Err(LedgerError::UnexpectedCustomer(self.kind));
                }
            }
            MovementKind::Transfer => {
                let origin = self
                    .origin_location_id
                    .ok_or(LedgerError::MissingOrigin(self.kind))?;
                let destination = self
                    .destination_location_id
                    .ok_or(LedgerError::MissingDestination(self.kind))?;
                if origin == destination {
                    return Err(LedgerError::SameLocation);
                }
                if self.customer_id.is_some() {
                    return Err(LedgerError::UnexpectedCustomer(self.kind));
                }
            }
            MovementKind::Exit => {
                if self.origin_location_id.is_none() {
                    return Err(LedgerError::MissingOrigin(self.kind));
                }
                if self.destination_location_id.is_some() {
                    return Err(LedgerError::UnexpectedDestination(self.kind));
                }
            }
        }
        Ok(())
    }

    /// Per-location deltas, sorted by location id
    pub fn deltas(&self) -> Result<Vec<StockDelta>, LedgerError> {
        self.validate()?;

        let mut deltas = Vec::with_capacity(2);
        if let Some(origin) = self.origin_location_id {
            deltas.push(StockDelta {
                location_id: origin,
                delta: -self.quantity,
            });
        }
        if let Some(destination) = self.destination_location_id {
            deltas.push(StockDelta {
                location_id: destination,
                delta: self.quantity,
            });
        }
        deltas.sort_by_key(|d| d.location_id);
        Ok(deltas)
    }

    /// Deltas that undo this movement
    pub fn reversal_deltas(&self) -> Result<Vec<StockDelta>, LedgerError> {
        Ok(reversal_deltas(&self.deltas()?))
    }
}

/// Negate deltas, keeping their order
pub fn reversal_deltas(deltas: &[StockDelta]) -> Vec<StockDelta> {
    deltas
        .iter()
        .map(|d| StockDelta {
            location_id: d.location_id,
            delta: -d.delta,
        })
        .collect()
}

/// Apply one delta to a current balance, refusing to go negative
pub fn check_delta(
    location_id: Uuid,
    current: Decimal,
    delta: Decimal,
) -> Result<Decimal, LedgerError> {
    let next = current + delta;
    if next < Decimal::ZERO {
        return Err(LedgerError::InsufficientStock {
            location_id,
            available: current,
            requested: -delta,
        });
    }
    Ok(next)
}

/// In-memory stock balances keyed by (product, location)
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    balances: HashMap<(Uuid, Uuid), Decimal>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance (e.g., from a database snapshot)
    pub fn set_balance(&mut self, product_id: Uuid, location_id: Uuid, quantity: Decimal) {
        self.balances.insert((product_id, location_id), quantity);
    }

    pub fn balance(&self, product_id: Uuid, location_id: Uuid) -> Decimal {
        self.balances
            .get(&(product_id, location_id))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Total quantity of a product across all locations
    pub fn total(&self, product_id: Uuid) -> Decimal {
        self.balances
            .iter()
            .filter(|((p, _), _)| *p == product_id)
            .map(|(_, q)| *q)
            .sum()
    }

    /// Locations holding a positive balance of the product, sorted by location id
    pub fn locations_of(&self, product_id: Uuid) -> Vec<(Uuid, Decimal)> {
        let mut held: Vec<(Uuid, Decimal)> = self
            .balances
            .iter()
            .filter(|((p, _), q)| *p == product_id && **q > Decimal::ZERO)
            .map(|((_, l), q)| (*l, *q))
            .collect();
        held.sort_by_key(|(l, _)| *l);
        held
    }

    /// Apply all deltas or none
    pub fn apply(&mut self, product_id: Uuid, deltas: &[StockDelta]) -> Result<(), LedgerError> {
        let mut next = Vec::with_capacity(deltas.len());
        for d in deltas {
            let current = next
                .iter()
                .rev()
                .find(|(l, _)| *l == d.location_id)
                .map(|(_, q)| *q)
                .unwrap_or_else(|| self.balance(product_id, d.location_id));
            next.push((d.location_id, check_delta(d.location_id, current, d.delta)?));
        }
        for (location_id, quantity) in next {
            self.balances.insert((product_id, location_id), quantity);
        }
        Ok(())
    }

    /// Validate and apply a movement
    pub fn record(&mut self, draft: &MovementDraft) -> Result<Vec<StockDelta>, LedgerError> {
        let deltas = draft.deltas()?;
        self.apply(draft.product_id, &deltas)?;
        Ok(deltas)
    }

    /// Undo a previously recorded movement
    pub fn reverse(&mut self, draft: &MovementDraft) -> Result<Vec<StockDelta>, LedgerError> {
        let deltas = draft.reversal_deltas()?;
        self.apply(draft.product_id, &deltas)?;
        Ok(deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(
        kind: MovementKind,
        product: Uuid,
        origin: Option<Uuid>,
        destination: Option<Uuid>,
        qty: i64,
    ) -> MovementDraft {
        MovementDraft {
            kind,
            product_id: product,
            origin_location_id: origin,
            destination_location_id: destination,
            quantity: Decimal::from(qty),
            customer_id: None,
        }
    }

    #[test]
    fn entry_then_exit() {
        let (p, a) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger
            .record(&draft(MovementKind::Entry, p, None, Some(a), 10))
            .unwrap();
        ledger
            .record(&draft(MovementKind::Exit, p, Some(a), None, 4))
            .unwrap();
        assert_eq!(ledger.balance(p, a), Decimal::from(6));
    }

    #[test]
    fn failed_transfer_leaves_ledger_unchanged() {
        let (p, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger.set_balance(p, a, Decimal::from(3));

        let err = ledger
            .record(&draft(MovementKind::Transfer, p, Some(a), Some(b), 5))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { location_id, .. } if location_id == a));
        assert_eq!(ledger.balance(p, a), Decimal::from(3));
        assert_eq!(ledger.balance(p, b), Decimal::ZERO);
    }

    #[test]
    fn shape_rules() {
        let (p, a) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            draft(MovementKind::Entry, p, Some(a), Some(a), 1).validate(),
            Err(LedgerError::UnexpectedOrigin(MovementKind::Entry))
        );
        assert_eq!(
            draft(MovementKind::Transfer, p, Some(a), Some(a), 1).validate(),
            Err(LedgerError::SameLocation)
        );
        assert_eq!(
            draft(MovementKind::Exit, p, None, None, 1).validate(),
            Err(LedgerError::MissingOrigin(MovementKind::Exit))
        );
        assert_eq!(
            draft(MovementKind::Exit, p, Some(a), None, 0).validate(),
            Err(LedgerError::NonPositiveQuantity)
        );
    }
}
