//! Stock ledger tests
//!
//! Movement bookkeeping: entries, transfers and exits change per-location balances,
//! cancelling restores them, and no balance ever drops below zero.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{LedgerError, MovementDraft, MovementKind, MovementStatus, StockLedger};
use uuid::Uuid;

fn entry(product: Uuid, destination: Uuid, qty: Decimal) -> MovementDraft {
    MovementDraft {
        kind: MovementKind::Entry,
        product_id: product,
        origin_location_id: None,
        destination_location_id: Some(destination),
        quantity: qty,
        customer_id: None,
    }
}

fn transfer(product: Uuid, origin: Uuid, destination: Uuid, qty: Decimal) -> MovementDraft {
    MovementDraft {
        kind: MovementKind::Transfer,
        product_id: product,
        origin_location_id: Some(origin),
        destination_location_id: Some(destination),
        quantity: qty,
        customer_id: None,
    }
}

fn exit(product: Uuid, origin: Uuid, qty: Decimal, customer: Option<Uuid>) -> MovementDraft {
    MovementDraft {
        kind: MovementKind::Exit,
        product_id: product,
        origin_location_id: Some(origin),
        destination_location_id: None,
        quantity: qty,
        customer_id: customer,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_entry_then_exit() {
        let (product, p1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();

        ledger.record(&entry(product, p1, Decimal::from(10))).unwrap();
        ledger
            .record(&exit(product, p1, Decimal::from(4), Some(Uuid::new_v4())))
            .unwrap();

        assert_eq!(ledger.balance(product, p1), Decimal::from(6));
    }

    #[test]
    fn test_exit_beyond_balance_is_refused() {
        let (product, p1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger.record(&entry(product, p1, Decimal::from(3))).unwrap();

        let err = ledger
            .record(&exit(product, p1, Decimal::from(5), None))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                location_id: p1,
                available: Decimal::from(3),
                requested: Decimal::from(5),
            }
        );
        assert_eq!(ledger.balance(product, p1), Decimal::from(3));
    }

    #[test]
    fn test_failed_transfer_leaves_both_locations_untouched() {
        let (product, p1, p2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger.record(&entry(product, p1, Decimal::from(2))).unwrap();

        assert!(ledger
            .record(&transfer(product, p1, p2, Decimal::from(3)))
            .is_err());
        assert_eq!(ledger.balance(product, p1), Decimal::from(2));
        assert_eq!(ledger.balance(product, p2), Decimal::ZERO);
    }

    #[test]
    fn test_movement_shapes() {
        let (product, p1) = (Uuid::new_v4(), Uuid::new_v4());

        let mut bad = entry(product, p1, Decimal::ONE);
        bad.origin_location_id = Some(Uuid::new_v4());
        assert_eq!(
            bad.validate(),
            Err(LedgerError::UnexpectedOrigin(MovementKind::Entry))
        );

        let same = transfer(product, p1, p1, Decimal::ONE);
        assert_eq!(same.validate(), Err(LedgerError::SameLocation));

        let mut with_customer = transfer(product, p1, Uuid::new_v4(), Decimal::ONE);
        with_customer.customer_id = Some(Uuid::new_v4());
        assert_eq!(
            with_customer.validate(),
            Err(LedgerError::UnexpectedCustomer(MovementKind::Transfer))
        );

        let zero = exit(product, p1, Decimal::ZERO, None);
        assert_eq!(zero.validate(), Err(LedgerError::NonPositiveQuantity));

        assert!(exit(product, p1, Decimal::ONE, None).validate().is_ok());
    }

    #[test]
    fn test_cancel_reverses_an_exit() {
        let (product, p1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger.record(&entry(product, p1, Decimal::from(8))).unwrap();
        let sale = exit(product, p1, Decimal::from(8), Some(Uuid::new_v4()));
        ledger.record(&sale).unwrap();
        assert_eq!(ledger.balance(product, p1), Decimal::ZERO);

        ledger.reverse(&sale).unwrap();
        assert_eq!(ledger.balance(product, p1), Decimal::from(8));
    }

    #[test]
    fn test_cancelling_an_entry_whose_stock_left_is_refused() {
        let (product, p1, p2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        let arrival = entry(product, p1, Decimal::from(5));
        ledger.record(&arrival).unwrap();
        ledger
            .record(&transfer(product, p1, p2, Decimal::from(5)))
            .unwrap();

        assert!(matches!(
            ledger.reverse(&arrival),
            Err(LedgerError::InsufficientStock { .. })
        ));
        assert_eq!(ledger.total(product), Decimal::from(5));
    }

    #[test]
    fn test_second_cancel_is_rejected() {
        let cancelled = MovementStatus::Active.cancel().unwrap();
        assert_eq!(cancelled, MovementStatus::Cancelled);
        assert_eq!(cancelled.cancel(), Err(LedgerError::AlreadyCancelled));
    }

    #[test]
    fn test_locations_of_lists_positive_balances() {
        let (product, p1, p2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger.record(&entry(product, p1, Decimal::from(4))).unwrap();
        ledger
            .record(&transfer(product, p1, p2, Decimal::from(4)))
            .unwrap();

        assert_eq!(ledger.locations_of(product), vec![(p2, Decimal::from(4))]);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Entry { to: usize, qty: i64 },
    Transfer { from: usize, to: usize, qty: i64 },
    Exit { from: usize, qty: i64 },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..3, 1i64..500).prop_map(|(to, qty)| Step::Entry { to, qty }),
        (0usize..3, 0usize..3, 1i64..500)
            .prop_map(|(from, to, qty)| Step::Transfer { from, to, qty }),
        (0usize..3, 1i64..500).prop_map(|(from, qty)| Step::Exit { from, qty }),
    ]
}

/// Quantities with up to three decimal places
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|units| Decimal::new(units, 3))
}

fn draft_for(step: &Step, product: Uuid, locations: &[Uuid; 3]) -> MovementDraft {
    match *step {
        Step::Entry { to, qty } => entry(product, locations[to], Decimal::from(qty)),
        Step::Transfer { from, to, qty } => {
            transfer(product, locations[from], locations[to], Decimal::from(qty))
        }
        Step::Exit { from, qty } => exit(product, locations[from], Decimal::from(qty), None),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Balances never go negative, whatever sequence of movements is attempted
    #[test]
    fn prop_balances_never_negative(steps in prop::collection::vec(step_strategy(), 1..40)) {
        let product = Uuid::new_v4();
        let locations = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut ledger = StockLedger::new();

        for step in &steps {
            let _ = ledger.record(&draft_for(step, product, &locations));
            for location in &locations {
                prop_assert!(ledger.balance(product, *location) >= Decimal::ZERO);
            }
        }
    }

    /// A transfer moves stock without changing the product total
    #[test]
    fn prop_transfer_conserves_total(
        initial in quantity_strategy(),
        moved in quantity_strategy(),
    ) {
        let (product, p1, p2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = StockLedger::new();
        ledger.record(&entry(product, p1, initial)).unwrap();

        let result = ledger.record(&transfer(product, p1, p2, moved));

        prop_assert_eq!(ledger.total(product), initial);
        if moved <= initial {
            prop_assert!(result.is_ok());
            prop_assert_eq!(ledger.balance(product, p1), initial - moved);
            prop_assert_eq!(ledger.balance(product, p2), moved);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(ledger.balance(product, p1), initial);
        }
    }

    /// Recording then reversing a movement restores every balance
    #[test]
    fn prop_reversal_restores_balances(
        seed in prop::collection::vec(step_strategy(), 0..20),
        last in step_strategy(),
    ) {
        let product = Uuid::new_v4();
        let locations = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut ledger = StockLedger::new();
        for step in &seed {
            let _ = ledger.record(&draft_for(step, product, &locations));
        }
        let before: Vec<Decimal> = locations.iter().map(|l| ledger.balance(product, *l)).collect();

        let draft = draft_for(&last, product, &locations);
        if ledger.record(&draft).is_ok() {
            ledger.reverse(&draft).unwrap();
        }

        let after: Vec<Decimal> = locations.iter().map(|l| ledger.balance(product, *l)).collect();
        prop_assert_eq!(before, after);
    }

    /// Entries minus exits equals the total held across all locations
    #[test]
    fn prop_total_matches_accepted_movements(steps in prop::collection::vec(step_strategy(), 1..40)) {
        let product = Uuid::new_v4();
        let locations = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut ledger = StockLedger::new();
        let mut expected = Decimal::ZERO;

        for step in &steps {
            if ledger.record(&draft_for(step, product, &locations)).is_ok() {
                match *step {
                    Step::Entry { qty, .. } => expected += Decimal::from(qty),
                    Step::Exit { qty, .. } => expected -= Decimal::from(qty),
                    Step::Transfer { .. } => {}
                }
            }
        }

        prop_assert_eq!(ledger.total(product), expected);
    }
}
