//! Reconciliation of parsed rows against existing products and stock

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ImportRow, LocationMatch, LocationMatcher, ParsedSheet, RowOutcome};
use crate::models::MovementKind;

/// Reference written on movements generated by an import
pub const IMPORT_REFERENCE: &str = "IMPORT";
/// Reference written on balance adjustments generated by an import
pub const ADJUSTMENT_REFERENCE: &str = "IMPORT-ADJ";

/// Snapshot of a product already in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingProduct {
    pub id: Uuid,
    pub idmm: String,
    pub variety: String,
    /// Positive balances per location
    pub stock: Vec<(Uuid, Decimal)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Update { product_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMovement {
    pub kind: MovementKind,
    pub origin_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedRow {
    pub line: usize,
    pub row: ImportRow,
    pub location_id: Uuid,
    pub location_code: String,
    pub action: PlannedAction,
    /// Movements to record, in order
    pub movements: Vec<PlannedMovement>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRow {
    pub line: usize,
    pub idmm: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub creates: usize,
    pub updates: usize,
    pub entries: usize,
    pub transfers: usize,
    pub exits: usize,
    pub rejected: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportPlan {
    pub rows: Vec<PlannedRow>,
    pub rejected: Vec<RejectedRow>,
    /// Sheet-level warnings
    pub warnings: Vec<String>,
}

impl ImportPlan {
    pub fn summary(&self) -> ImportSummary {
        let mut summary = ImportSummary {
            total_rows: self.rows.len() + self.rejected.len(),
            rejected: self.rejected.len(),
            warnings: self.warnings.len()
                + self.rows.iter().map(|r| r.warnings.len()).sum::<usize>()
                + self.rejected.iter().map(|r| r.warnings.len()).sum::<usize>(),
            ..ImportSummary::default()
        };
        for row in &self.rows {
            match row.action {
                PlannedAction::Create => summary.creates += 1,
                PlannedAction::Update { .. } => summary.updates += 1,
            }
            for movement in &row.movements {
                match movement.kind {
                    MovementKind::Entry => summary.entries += 1,
                    MovementKind::Transfer => summary.transfers += 1,
                    MovementKind::Exit => summary.exits += 1,
                }
            }
        }
        summary
    }

    /// Planned rows split into commit batches of at most `size`
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[PlannedRow]> {
        self.rows.chunks(size.max(1))
    }
}

/// Builds an [`ImportPlan`] from parsed rows
pub struct ImportPlanner<'a> {
    products: HashMap<&'a str, &'a ExistingProduct>,
    locations: &'a LocationMatcher,
}

impl<'a> ImportPlanner<'a> {
    pub fn new(products: &'a [ExistingProduct], locations: &'a LocationMatcher) -> Self {
        Self {
            products: products.iter().map(|p| (p.idmm.as_str(), p)).collect(),
            locations,
        }
    }

    pub fn plan(&self, sheet: ParsedSheet) -> ImportPlan {
        let mut plan = ImportPlan {
            warnings: sheet.warnings,
            ..ImportPlan::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for outcome in sheet.rows {
            match self.plan_row(outcome, &mut seen) {
                Ok(row) => plan.rows.push(row),
                Err(rejected) => plan.rejected.push(rejected),
            }
        }
        plan
    }

    fn plan_row(
        &self,
        outcome: RowOutcome,
        seen: &mut HashSet<String>,
    ) -> Result<PlannedRow, RejectedRow> {
        let RowOutcome {
            line,
            idmm,
            row,
            mut errors,
            mut warnings,
        } = outcome;

        if let Some(code) = &idmm {
            if !seen.insert(code.clone()) {
                errors.push(format!("ID_MM '{}' appears more than once in the file", code));
            }
        }

        let Some(row) = row.filter(|_| errors.is_empty()) else {
            return Err(RejectedRow {
                line,
                idmm,
                errors,
                warnings,
            });
        };

        let location = match self.locations.find(&row.location) {
            LocationMatch::Exact { location } => Some(location),
            LocationMatch::Fuzzy { location, score } => {
                warnings.push(format!(
                    "location '{}' matched to '{}' ({:.0}%)",
                    row.location,
                    location.code,
                    score * 100.0
                ));
                Some(location)
            }
            LocationMatch::Ambiguous { candidates } => {
                errors.push(format!(
                    "location '{}' is ambiguous: {}",
                    row.location,
                    candidates.join(", ")
                ));
                None
            }
            LocationMatch::NotFound => {
                errors.push(format!("location '{}' not found", row.location));
                None
            }
        };

        let existing = self.products.get(row.idmm.as_str()).copied();
        if existing.is_none() && row.variety.is_none() {
            errors.push("Variedade is required for new products".to_string());
        }

        let Some(location) = location.filter(|_| errors.is_empty()) else {
            return Err(RejectedRow {
                line,
                idmm: Some(row.idmm),
                errors,
                warnings,
            });
        };

        let target = location.id;
        let (action, movements) = match existing {
            None => {
                let mut movements = Vec::new();
                if row.quantity > Decimal::ZERO {
                    movements.push(PlannedMovement {
                        kind: MovementKind::Entry,
                        origin_location_id: None,
                        destination_location_id: Some(target),
                        quantity: row.quantity,
                        reference: IMPORT_REFERENCE.to_string(),
                    });
                }
                (PlannedAction::Create, movements)
            }
            Some(product) => {
                if let Some(variety) = &row.variety {
                    if !variety.eq_ignore_ascii_case(&product.variety) {
                        warnings.push(format!(
                            "variety changes from '{}' to '{}'",
                            product.variety, variety
                        ));
                    }
                }
                let movements = reconcile(product, target, row.quantity, &mut warnings);
                (
                    PlannedAction::Update {
                        product_id: product.id,
                    },
                    movements,
                )
            }
        };

        Ok(PlannedRow {
            line,
            location_id: target,
            location_code: location.code,
            row,
            action,
            movements,
            warnings,
        })
    }
}

/// Movements that bring an existing product to `quantity` at `target`
fn reconcile(
    product: &ExistingProduct,
    target: Uuid,
    quantity: Decimal,
    warnings: &mut Vec<String>,
) -> Vec<PlannedMovement> {
    let at_target: Decimal = product
        .stock
        .iter()
        .filter(|(l, q)| *l == target && *q > Decimal::ZERO)
        .map(|(_, q)| *q)
        .sum();
    let elsewhere: Vec<(Uuid, Decimal)> = product
        .stock
        .iter()
        .filter(|(l, q)| *l != target && *q > Decimal::ZERO)
        .copied()
        .collect();

    let mut movements = Vec::new();
    let mut current = at_target;

    match elsewhere.as_slice() {
        [(origin, held)] if at_target.is_zero() => {
            movements.push(PlannedMovement {
                kind: MovementKind::Transfer,
                origin_location_id: Some(*origin),
                destination_location_id: Some(target),
                quantity: *held,
                reference: IMPORT_REFERENCE.to_string(),
            });
            current = *held;
        }
        [] | [_] => {}
        many => warnings.push(format!(
            "product is stocked in {} other locations; only the target balance was adjusted",
            many.len()
        )),
    }

    if quantity > current {
        movements.push(PlannedMovement {
            kind: MovementKind::Entry,
            origin_location_id: None,
            destination_location_id: Some(target),
            quantity: quantity - current,
            reference: ADJUSTMENT_REFERENCE.to_string(),
        });
    } else if quantity < current {
        movements.push(PlannedMovement {
            kind: MovementKind::Exit,
            origin_location_id: Some(target),
            destination_location_id: None,
            quantity: current - quantity,
            reference: ADJUSTMENT_REFERENCE.to_string(),
        });
    }
    movements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{parse_sheet, LocationRef};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    struct Fixture {
        p1: LocationRef,
        p2: LocationRef,
        p3: LocationRef,
        matcher: LocationMatcher,
    }

    fn fixture() -> Fixture {
        let make = |code: &str| LocationRef {
            id: Uuid::new_v4(),
            code: code.into(),
            name: format!("Parque {}", code),
            is_active: true,
        };
        let (p1, p2, p3) = (make("P1"), make("P2"), make("P3"));
        let matcher = LocationMatcher::new(&[p1.clone(), p2.clone(), p3.clone()]);
        Fixture { p1, p2, p3, matcher }
    }

    fn sheet(rows: &[[&str; 5]]) -> ParsedSheet {
        let headers = strings(&["ID_MM", "Localizacao", "Variedade", "Tipo", "Quantidade"]);
        let rows: Vec<Vec<String>> = rows.iter().map(|r| strings(r)).collect();
        parse_sheet(&headers, &rows, 100).unwrap()
    }

    #[test]
    fn new_product_gets_an_entry() {
        let f = fixture();
        let planner = ImportPlanner::new(&[], &f.matcher);
        let plan = planner.plan(sheet(&[["A1", "P1", "Estremoz", "Chapa", "12"]]));

        assert_eq!(plan.rows.len(), 1);
        let row = &plan.rows[0];
        assert_eq!(row.action, PlannedAction::Create);
        assert_eq!(row.movements.len(), 1);
        assert_eq!(row.movements[0].kind, MovementKind::Entry);
        assert_eq!(row.movements[0].destination_location_id, Some(f.p1.id));
    }

    #[test]
    fn moved_product_is_transferred_then_adjusted() {
        let f = fixture();
        let existing = vec![ExistingProduct {
            id: Uuid::new_v4(),
            idmm: "A1".into(),
            variety: "Estremoz".into(),
            stock: vec![(f.p1.id, Decimal::from(10))],
        }];
        let planner = ImportPlanner::new(&existing, &f.matcher);
        let plan = planner.plan(sheet(&[["A1", "P2", "", "", "8"]]));

        let movements = &plan.rows[0].movements;
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].kind, MovementKind::Transfer);
        assert_eq!(movements[0].origin_location_id, Some(f.p1.id));
        assert_eq!(movements[0].quantity, Decimal::from(10));
        assert_eq!(movements[1].kind, MovementKind::Exit);
        assert_eq!(movements[1].origin_location_id, Some(f.p2.id));
        assert_eq!(movements[1].quantity, Decimal::from(2));
        assert_eq!(movements[1].reference, ADJUSTMENT_REFERENCE);
    }

    #[test]
    fn split_stock_only_adjusts_target() {
        let f = fixture();
        let existing = vec![ExistingProduct {
            id: Uuid::new_v4(),
            idmm: "A1".into(),
            variety: "Estremoz".into(),
            stock: vec![(f.p1.id, Decimal::from(3)), (f.p2.id, Decimal::from(4))],
        }];
        let planner = ImportPlanner::new(&existing, &f.matcher);
        let plan = planner.plan(sheet(&[["A1", "P3", "", "", "5"]]));

        let row = &plan.rows[0];
        assert_eq!(row.movements.len(), 1);
        assert_eq!(row.movements[0].kind, MovementKind::Entry);
        assert_eq!(row.movements[0].quantity, Decimal::from(5));
        assert_eq!(row.movements[0].destination_location_id, Some(f.p3.id));
        assert!(row.warnings.iter().any(|w| w.contains("2 other locations")));
    }

    #[test]
    fn unchanged_quantity_plans_nothing() {
        let f = fixture();
        let existing = vec![ExistingProduct {
            id: Uuid::new_v4(),
            idmm: "A1".into(),
            variety: "Estremoz".into(),
            stock: vec![(f.p1.id, Decimal::from(7))],
        }];
        let planner = ImportPlanner::new(&existing, &f.matcher);
        let plan = planner.plan(sheet(&[["A1", "P1", "", "", "7"]]));
        assert!(plan.rows[0].movements.is_empty());
        assert_eq!(plan.summary().updates, 1);
    }

    #[test]
    fn rejections() {
        let f = fixture();
        let planner = ImportPlanner::new(&[], &f.matcher);
        let plan = planner.plan(sheet(&[
            ["A1", "P1", "Estremoz", "", "1"],
            ["A1", "P1", "Estremoz", "", "2"],
            ["A2", "P9", "Estremoz", "", "1"],
            ["A3", "P1", "", "", "1"],
        ]));

        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rejected.len(), 3);
        assert!(plan.rejected[0].errors[0].contains("more than once"));
        assert!(plan.rejected[1].errors[0].contains("not found"));
        assert!(plan.rejected[2].errors[0].contains("Variedade"));

        let summary = plan.summary();
        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.creates, 1);
        assert_eq!(summary.entries, 1);
    }

    #[test]
    fn batching() {
        let f = fixture();
        let planner = ImportPlanner::new(&[], &f.matcher);
        let rows: Vec<Vec<String>> = (0..5)
            .map(|i| strings(&[format!("B{}", i).as_str(), "P1", "Azul", "", "1"]))
            .collect();
        let headers = strings(&["ID_MM", "Localizacao", "Variedade", "Tipo", "Quantidade"]);
        let plan = planner.plan(parse_sheet(&headers, &rows, 100).unwrap());

        let sizes: Vec<usize> = plan.batches(2).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }
}
