//! Spreadsheet import tests
//!
//! Header recognition, row validation, location matching and reconciliation of
//! imported rows against existing stock.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::import::{
    normalize_location_code, parse_sheet, parse_sheet_with_lines, ExistingProduct, HeaderMap,
    ImportColumn, ImportError, ImportPlanner, LocationMatch, LocationMatcher, LocationRef,
    PlannedAction, ADJUSTMENT_REFERENCE, IMPORT_REFERENCE,
};
use shared::{LengthUnit, MovementKind, StockUnit};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn location(code: &str, name: &str) -> LocationRef {
    LocationRef {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: name.to_string(),
        is_active: true,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_header_aliases() {
        let map = HeaderMap::from_headers(&[
            "Código",
            "Parque",
            "Material",
            "Espessura (mm)",
            "Qtd",
            "Preço Unitário",
            "Observações",
        ])
        .unwrap();

        assert!(map.has(ImportColumn::Idmm));
        assert!(map.has(ImportColumn::Location));
        assert!(map.has(ImportColumn::Variety));
        assert!(map.has(ImportColumn::Thickness));
        assert!(map.has(ImportColumn::Quantity));
        assert!(map.has(ImportColumn::Price));
        assert!(map.has(ImportColumn::Notes));
        assert_eq!(map.unit(ImportColumn::Thickness), LengthUnit::Millimetre);
        assert_eq!(map.unit(ImportColumn::Quantity), LengthUnit::Centimetre);
        assert!(map.unknown.is_empty());
    }

    #[test]
    fn test_canonical_headers_round_trip() {
        for column in ImportColumn::ALL {
            let (found, _) = ImportColumn::from_header(column.header()).unwrap();
            assert_eq!(found, column);
        }
    }

    #[test]
    fn test_missing_and_duplicate_columns() {
        assert_eq!(
            HeaderMap::from_headers(&["Localizacao", "Quantidade"]).unwrap_err(),
            ImportError::MissingColumn("ID_MM")
        );
        assert_eq!(
            HeaderMap::from_headers(&["ID_MM", "Local", "Parque"]).unwrap_err(),
            ImportError::DuplicateColumn("Localizacao".to_string())
        );
        assert_eq!(
            HeaderMap::from_headers(&["", " "]).unwrap_err(),
            ImportError::EmptySheet
        );
    }

    #[test]
    fn test_unknown_columns_are_warned() {
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade", "Fornecedor"]);
        let rows = vec![strings(&["A1", "P1", "3", "Solancis"])];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();

        assert!(sheet.warnings.iter().any(|w| w.contains("Fornecedor")));
        assert!(sheet.rows[0].is_valid());
    }

    #[test]
    fn test_row_limit() {
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade"]);
        let rows: Vec<Vec<String>> = (0..4)
            .map(|i| strings(&[&format!("A{}", i), "P1", "1"]))
            .collect();

        assert_eq!(
            parse_sheet(&headers, &rows, 3).unwrap_err(),
            ImportError::TooManyRows { max: 3, found: 4 }
        );
    }

    #[test]
    fn test_rows_keep_their_file_lines() {
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade"]);
        let rows = vec![
            strings(&["", "P1", "1"]),
            strings(&["", "", ""]),
            strings(&["A2", "P1", "x"]),
        ];
        let sheet = parse_sheet_with_lines(&headers, &rows, &[4, 5, 9], 100).unwrap();

        let lines: Vec<usize> = sheet.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![4, 9]);
        assert!(sheet.warnings.iter().any(|w| w.contains("1 blank")));

        let default = parse_sheet(&headers, &rows, 100).unwrap();
        let lines: Vec<usize> = default.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn test_quantity_derived_from_dimensions() {
        let headers = strings(&["ID_MM", "Localizacao", "Tipo", "Dimensoes"]);
        let rows = vec![strings(&["A1", "P1", "Chapa", "300 x 200 x 2"])];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();

        let row = sheet.rows[0].row.as_ref().unwrap();
        assert!(row.quantity_derived);
        assert_eq!(row.quantity, dec("6"));
        assert!(sheet.rows[0]
            .warnings
            .iter()
            .any(|w| w.contains("derived from dimensions")));
    }

    #[test]
    fn test_invalid_cells_reject_the_row() {
        let headers = strings(&["ID_MM", "Localizacao", "Tipo", "Unidade", "Quantidade"]);
        let rows = vec![
            strings(&["A1", "P1", "Mesa", "m2", "1"]),
            strings(&["A2", "P1", "Chapa", "litros", "1"]),
            strings(&["A3", "P1", "Chapa", "m2", "-2"]),
            strings(&["", "P1", "Chapa", "m2", "4"]),
        ];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();

        assert_eq!(sheet.rows.len(), 4);
        assert!(sheet.rows.iter().all(|r| !r.is_valid()));
        assert_eq!(sheet.rows[0].line, 2);
        assert_eq!(sheet.rows[3].idmm, None);
    }

    #[test]
    fn test_decimal_comma_quantities_and_units() {
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade", "Unidade"]);
        let rows = vec![strings(&["a-1", "P1", "12,5", "m²"])];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();

        let row = sheet.rows[0].row.as_ref().unwrap();
        assert_eq!(row.idmm, "A-1");
        assert_eq!(row.quantity, dec("12.5"));
        assert_eq!(row.unit, Some(StockUnit::M2));
    }

    #[test]
    fn test_location_normalization() {
        assert_eq!(normalize_location_code("Parque 01"), "P1");
        assert_eq!(normalize_location_code("p-1"), "P1");
        assert_eq!(normalize_location_code("Armazém 003"), "ARMAZEM3");
    }

    #[test]
    fn test_exact_and_name_matches() {
        let p1 = location("P1", "Parque Norte");
        let matcher = LocationMatcher::new(&[p1.clone(), location("P2", "Parque Sul")]);

        assert!(matches!(
            matcher.find("parque 1"),
            LocationMatch::Exact { location } if location.id == p1.id
        ));
        assert!(matches!(
            matcher.find("Parque Norte"),
            LocationMatch::Exact { location } if location.id == p1.id
        ));
        assert_eq!(matcher.find(""), LocationMatch::NotFound);
    }

    #[test]
    fn test_fuzzy_match_requires_equal_numbers() {
        let armazem = location("ARM1", "Armazem 1");
        let matcher = LocationMatcher::new(&[armazem.clone(), location("P12", "Parque 12")]);

        match matcher.find("Armazen 1") {
            LocationMatch::Fuzzy { location, score } => {
                assert_eq!(location.id, armazem.id);
                assert!(score >= 0.88);
            }
            other => panic!("expected fuzzy match, got {:?}", other),
        }
        assert_eq!(matcher.find("Parque 1"), LocationMatch::NotFound);
    }

    #[test]
    fn test_inactive_locations_never_match() {
        let mut closed = location("P9", "Parque 9");
        closed.is_active = false;
        let matcher = LocationMatcher::new(&[closed]);

        assert_eq!(matcher.find("P9"), LocationMatch::NotFound);
    }

    #[test]
    fn test_duplicate_idmm_in_file() {
        let p1 = location("P1", "Parque 1");
        let matcher = LocationMatcher::new(&[p1]);
        let headers = strings(&["ID_MM", "Localizacao", "Variedade", "Quantidade"]);
        let rows = vec![
            strings(&["A1", "P1", "Estremoz", "2"]),
            strings(&[" a1 ", "P1", "Estremoz", "3"]),
        ];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();
        let plan = ImportPlanner::new(&[], &matcher).plan(sheet);

        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(plan.rejected[0].line, 3);
        assert!(plan.rejected[0].errors[0].contains("more than once"));
    }

    #[test]
    fn test_new_product_needs_variety() {
        let matcher = LocationMatcher::new(&[location("P1", "Parque 1")]);
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade"]);
        let sheet = parse_sheet(&headers, &[strings(&["A1", "P1", "2"])], 100).unwrap();
        let plan = ImportPlanner::new(&[], &matcher).plan(sheet);

        assert!(plan.rows.is_empty());
        assert!(plan.rejected[0].errors[0].contains("Variedade"));
    }

    #[test]
    fn test_moved_product_becomes_a_transfer() {
        let (p1, p2) = (location("P1", "Parque 1"), location("P2", "Parque 2"));
        let matcher = LocationMatcher::new(&[p1.clone(), p2.clone()]);
        let product_id = Uuid::new_v4();
        let existing = vec![ExistingProduct {
            id: product_id,
            idmm: "A1".into(),
            variety: "Estremoz".into(),
            stock: vec![(p1.id, dec("4"))],
        }];
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade"]);
        let sheet = parse_sheet(&headers, &[strings(&["A1", "P2", "4"])], 100).unwrap();
        let plan = ImportPlanner::new(&existing, &matcher).plan(sheet);

        let row = &plan.rows[0];
        assert_eq!(row.action, PlannedAction::Update { product_id });
        assert_eq!(row.movements.len(), 1);
        assert_eq!(row.movements[0].kind, MovementKind::Transfer);
        assert_eq!(row.movements[0].origin_location_id, Some(p1.id));
        assert_eq!(row.movements[0].destination_location_id, Some(p2.id));
        assert_eq!(row.movements[0].reference, IMPORT_REFERENCE);
    }

    #[test]
    fn test_higher_quantity_adds_an_adjustment_entry() {
        let p1 = location("P1", "Parque 1");
        let matcher = LocationMatcher::new(&[p1.clone()]);
        let existing = vec![ExistingProduct {
            id: Uuid::new_v4(),
            idmm: "A1".into(),
            variety: "Estremoz".into(),
            stock: vec![(p1.id, dec("4"))],
        }];
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade"]);
        let sheet = parse_sheet(&headers, &[strings(&["A1", "P1", "6,5"])], 100).unwrap();
        let plan = ImportPlanner::new(&existing, &matcher).plan(sheet);

        let movements = &plan.rows[0].movements;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Entry);
        assert_eq!(movements[0].quantity, dec("2.5"));
        assert_eq!(movements[0].reference, ADJUSTMENT_REFERENCE);
    }

    #[test]
    fn test_summary_counts() {
        let (p1, p2) = (location("P1", "Parque 1"), location("P2", "Parque 2"));
        let matcher = LocationMatcher::new(&[p1.clone(), p2.clone()]);
        let existing = vec![ExistingProduct {
            id: Uuid::new_v4(),
            idmm: "OLD".into(),
            variety: "Estremoz".into(),
            stock: vec![(p1.id, dec("10"))],
        }];
        let headers = strings(&["ID_MM", "Localizacao", "Variedade", "Quantidade"]);
        let rows = vec![
            strings(&["NEW", "P1", "Rosa Aurora", "3"]),
            strings(&["OLD", "P2", "", "7"]),
            strings(&["BAD", "P7", "Estremoz", "1"]),
        ];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();
        let summary = ImportPlanner::new(&existing, &matcher).plan(sheet).summary();

        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.creates, 1);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.transfers, 1);
        assert_eq!(summary.exits, 1);
        assert_eq!(summary.rejected, 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000).prop_map(|units| Decimal::new(units, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// After applying the planned movements the product holds exactly the imported
    /// quantity at the target location
    #[test]
    fn prop_reconciliation_reaches_target(
        held in quantity_strategy(),
        wanted in quantity_strategy(),
        moved in any::<bool>(),
    ) {
        let (p1, p2) = (location("P1", "Parque 1"), location("P2", "Parque 2"));
        let matcher = LocationMatcher::new(&[p1.clone(), p2.clone()]);
        let stock = if held.is_zero() { vec![] } else { vec![(p1.id, held)] };
        let existing = vec![ExistingProduct {
            id: Uuid::new_v4(),
            idmm: "A1".into(),
            variety: "Estremoz".into(),
            stock,
        }];
        let target = if moved { &p2 } else { &p1 };
        let headers = strings(&["ID_MM", "Localizacao", "Quantidade"]);
        let rows = vec![strings(&["A1", &target.code, &wanted.to_string()])];
        let sheet = parse_sheet(&headers, &rows, 100).unwrap();
        let plan = ImportPlanner::new(&existing, &matcher).plan(sheet);

        let mut balances = std::collections::HashMap::from([(p1.id, held), (p2.id, Decimal::ZERO)]);
        for m in &plan.rows[0].movements {
            prop_assert!(m.quantity > Decimal::ZERO);
            if let Some(origin) = m.origin_location_id {
                *balances.get_mut(&origin).unwrap() -= m.quantity;
            }
            if let Some(destination) = m.destination_location_id {
                *balances.get_mut(&destination).unwrap() += m.quantity;
            }
        }

        prop_assert_eq!(balances[&target.id], wanted);
        for quantity in balances.values() {
            prop_assert!(*quantity >= Decimal::ZERO);
        }
    }
}
