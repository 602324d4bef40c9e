//! Stock balance models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockUnit;

/// Quantity of one product held at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntry {
    pub product_id: Uuid,
    pub idmm: String,
    pub variety: String,
    pub location_id: Uuid,
    pub location_code: String,
    pub quantity: Decimal,
    pub unit: StockUnit,
    pub unit_price: Option<Decimal>,
}

impl StockEntry {
    pub fn value(&self) -> Option<Decimal> {
        self.unit_price.map(|p| p * self.quantity)
    }
}

/// Aggregated quantity for one unit at one location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitTotal {
    pub unit: StockUnit,
    pub quantity: Decimal,
}

/// Stock totals and valuation per location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStockSummary {
    pub location_id: Uuid,
    pub location_code: String,
    pub location_name: String,
    pub product_count: i64,
    pub totals: Vec<UnitTotal>,
    pub total_value: Decimal,
    /// Products counted here without a unit price
    pub unpriced_products: i64,
}

/// Build per-location summaries from stock entries
///
/// Entries with zero quantity are ignored. Output is ordered by location code.
pub fn summarize_by_location(
    entries: &[StockEntry],
    location_names: &std::collections::HashMap<Uuid, String>,
) -> Vec<LocationStockSummary> {
    use std::collections::BTreeMap;

    let mut by_location: BTreeMap<(String, Uuid), Vec<&StockEntry>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| !e.quantity.is_zero()) {
        by_location
            .entry((entry.location_code.clone(), entry.location_id))
            .or_default()
            .push(entry);
    }

    by_location
        .into_iter()
        .map(|((code, location_id), items)| {
            let mut totals: Vec<UnitTotal> = Vec::new();
            let mut total_value = Decimal::ZERO;
            let mut unpriced = 0;
            for item in &items {
                match totals.iter_mut().find(|t| t.unit == item.unit) {
                    Some(t) => t.quantity += item.quantity,
                    None => totals.push(UnitTotal {
                        unit: item.unit,
                        quantity: item.quantity,
                    }),
                }
                match item.value() {
                    Some(v) => total_value += v,
                    None => unpriced += 1,
                }
            }
            totals.sort_by_key(|t| t.unit.as_str());
            LocationStockSummary {
                location_id,
                location_name: location_names
                    .get(&location_id)
                    .cloned()
                    .unwrap_or_else(|| code.clone()),
                location_code: code,
                product_count: items.len() as i64,
                totals,
                total_value,
                unpriced_products: unpriced,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(location: Uuid, code: &str, qty: i64, unit: StockUnit, price: Option<i64>) -> StockEntry {
        StockEntry {
            product_id: Uuid::new_v4(),
            idmm: "MM-1".into(),
            variety: "Estremoz".into(),
            location_id: location,
            location_code: code.into(),
            quantity: Decimal::from(qty),
            unit,
            unit_price: price.map(Decimal::from),
        }
    }

    #[test]
    fn summary_groups_units_and_values() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let entries = vec![
            entry(p2, "P2", 5, StockUnit::M3, Some(100)),
            entry(p1, "P1", 10, StockUnit::M2, Some(50)),
            entry(p1, "P1", 4, StockUnit::M2, None),
            entry(p1, "P1", 2, StockUnit::M3, Some(300)),
            entry(p1, "P1", 0, StockUnit::M3, Some(300)),
        ];
        let mut names = HashMap::new();
        names.insert(p1, "Parque 1".to_string());

        let summary = summarize_by_location(&entries, &names);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].location_code, "P1");
        assert_eq!(summary[0].location_name, "Parque 1");
        assert_eq!(summary[0].product_count, 3);
        assert_eq!(summary[0].total_value, Decimal::from(1100));
        assert_eq!(summary[0].unpriced_products, 1);
        assert_eq!(
            summary[0].totals,
            vec![
                UnitTotal { unit: StockUnit::M2, quantity: Decimal::from(14) },
                UnitTotal { unit: StockUnit::M3, quantity: Decimal::from(2) },
            ]
        );
        assert_eq!(summary[1].location_name, "P2");
    }
}
