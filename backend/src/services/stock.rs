//! Stock balances and valuation

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::product::parse_stored;
use crate::error::AppResult;
use shared::{summarize_by_location, LocationStockSummary, StockEntry};

#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockFilter {
    pub location_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    /// Include zero balances
    #[serde(default)]
    pub include_empty: bool,
}

/// Company-wide totals with the per-location breakdown
#[derive(Debug, Clone, Serialize)]
pub struct StockSummary {
    pub locations: Vec<LocationStockSummary>,
    pub total_value: Decimal,
    pub product_count: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct StockEntryRow {
    product_id: Uuid,
    idmm: String,
    variety: String,
    location_id: Uuid,
    location_code: String,
    quantity: Decimal,
    unit: String,
    unit_price: Option<Decimal>,
}

impl TryFrom<StockEntryRow> for StockEntry {
    type Error = crate::error::AppError;

    fn try_from(row: StockEntryRow) -> Result<Self, Self::Error> {
        Ok(StockEntry {
            product_id: row.product_id,
            idmm: row.idmm,
            variety: row.variety,
            location_id: row.location_id,
            location_code: row.location_code,
            quantity: row.quantity,
            unit: parse_stored(&row.unit)?,
            unit_price: row.unit_price,
        })
    }
}

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, company_id: Uuid, filter: &StockFilter) -> AppResult<Vec<StockEntry>> {
        let rows = sqlx::query_as::<_, StockEntryRow>(
            r#"
            SELECT s.product_id, p.idmm, p.variety, s.location_id, l.code AS location_code,
                   s.quantity, p.unit, p.unit_price
            FROM stock s
            JOIN produtos p ON p.id = s.product_id
            JOIN locais l ON l.id = s.location_id
            WHERE s.company_id = $1
              AND ($2::uuid IS NULL OR s.location_id = $2)
              AND ($3::uuid IS NULL OR s.product_id = $3)
              AND ($4 OR s.quantity > 0)
            ORDER BY l.code, p.idmm
            "#,
        )
        .bind(company_id)
        .bind(filter.location_id)
        .bind(filter.product_id)
        .bind(filter.include_empty)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockEntry::try_from).collect()
    }

    pub async fn for_product(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Vec<StockEntry>> {
        self.list(
            company_id,
            &StockFilter {
                product_id: Some(product_id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn for_location(&self, company_id: Uuid, location_id: Uuid) -> AppResult<Vec<StockEntry>> {
        self.list(
            company_id,
            &StockFilter {
                location_id: Some(location_id),
                ..Default::default()
            },
        )
        .await
    }

    /// Quantity per unit, product count and valuation for every location
    pub async fn summary(&self, company_id: Uuid) -> AppResult<StockSummary> {
        let entries = self.list(company_id, &StockFilter::default()).await?;

        let names: HashMap<Uuid, String> = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, name FROM locais WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        Ok(build_summary(summarize_by_location(&entries, &names), &entries))
    }
}

fn build_summary(locations: Vec<LocationStockSummary>, entries: &[StockEntry]) -> StockSummary {
    let mut products: Vec<Uuid> = entries
        .iter()
        .filter(|e| e.quantity > Decimal::ZERO)
        .map(|e| e.product_id)
        .collect();
    products.sort();
    products.dedup();

    StockSummary {
        total_value: locations.iter().map(|l| l.total_value).sum(),
        product_count: products.len() as i64,
        locations,
    }
}
