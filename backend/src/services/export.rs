//! Product and stock export in the import column layout

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::product::parse_stored;
use crate::error::{AppError, AppResult};
use shared::import::ImportColumn;
use shared::{Dimensions, ProductKind};

#[derive(Clone)]
pub struct ExportService {
    db: PgPool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

/// One product at one location; products without stock get a single row
#[derive(Debug, Clone, FromRow)]
struct ExportRow {
    idmm: String,
    location_code: Option<String>,
    variety: String,
    kind: String,
    finish: Option<String>,
    length_cm: Option<Decimal>,
    width_cm: Option<Decimal>,
    thickness_cm: Option<Decimal>,
    quantity: Option<Decimal>,
    unit: String,
    unit_price: Option<Decimal>,
    photo_url: Option<String>,
    photo_hd_url: Option<String>,
    notes: Option<String>,
}

enum Cell {
    Text(String),
    Number(Decimal),
    Empty,
}

fn text(value: &Option<String>) -> Cell {
    value.clone().map(Cell::Text).unwrap_or(Cell::Empty)
}

fn number(value: Option<Decimal>) -> Cell {
    value.map(Cell::Number).unwrap_or(Cell::Empty)
}

impl ExportRow {
    fn cells(&self) -> AppResult<Vec<Cell>> {
        let kind: ProductKind = parse_stored(&self.kind)?;
        let dimensions = Dimensions {
            length_cm: self.length_cm,
            width_cm: self.width_cm,
            thickness_cm: self.thickness_cm,
        };

        Ok(ImportColumn::ALL
            .iter()
            .map(|column| match column {
                ImportColumn::Idmm => Cell::Text(self.idmm.clone()),
                ImportColumn::Location => text(&self.location_code),
                ImportColumn::Variety => Cell::Text(self.variety.clone()),
                ImportColumn::Kind => Cell::Text(kind.label_pt().to_string()),
                ImportColumn::Finish => text(&self.finish),
                ImportColumn::Length => number(self.length_cm),
                ImportColumn::Width => number(self.width_cm),
                ImportColumn::Thickness => number(self.thickness_cm),
                ImportColumn::Dimensions => text(&dimensions.display()),
                ImportColumn::Quantity => Cell::Number(self.quantity.unwrap_or(Decimal::ZERO)),
                ImportColumn::Unit => Cell::Text(self.unit.clone()),
                ImportColumn::Price => number(self.unit_price),
                ImportColumn::Photo => text(&self.photo_url),
                ImportColumn::PhotoHd => text(&self.photo_hd_url),
                ImportColumn::Notes => text(&self.notes),
            })
            .collect())
    }
}

/// Rows the importer accepts back unchanged
///
/// Drops products without stock (no Localizacao) and products stocked at more
/// than one location (their ID_MM would repeat).
fn reimportable(rows: Vec<ExportRow>) -> Vec<ExportRow> {
    let mut per_product: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        *per_product.entry(row.idmm.clone()).or_default() += 1;
    }
    rows.into_iter()
        .filter(|r| r.location_code.is_some() && per_product.get(&r.idmm) == Some(&1))
        .collect()
}

fn write_xlsx(rows: &[ExportRow]) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Stock")?;

    for (col, column) in ImportColumn::ALL.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, column.header(), &bold)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.cells()?.into_iter().enumerate() {
            match cell {
                Cell::Text(value) => {
                    worksheet.write_string(r, col as u16, value)?;
                }
                Cell::Number(value) => {
                    let value = value.to_f64().ok_or_else(|| {
                        AppError::Internal(format!("Number out of range: {}", value))
                    })?;
                    worksheet.write_number(r, col as u16, value)?;
                }
                Cell::Empty => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_csv(rows: &[ExportRow]) -> AppResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(ImportColumn::ALL.iter().map(|c| c.header()))?;

    for row in rows {
        let record: Vec<String> = row
            .cells()?
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(value) => value,
                Cell::Number(value) => value.normalize().to_string(),
                Cell::Empty => String::new(),
            })
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))
}

impl ExportService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// File bytes and suggested file name
    ///
    /// The full export has one row per product and location, plus one row without
    /// Localizacao for each product out of stock; such a file does not import
    /// back as is. With `reimportable` only rows the importer accepts are written.
    pub async fn products(
        &self,
        company_id: Uuid,
        format: ExportFormat,
        reimportable_only: bool,
    ) -> AppResult<(Vec<u8>, String)> {
        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT p.idmm, l.code AS location_code, p.variety, p.kind, p.finish, p.length_cm,
                   p.width_cm, p.thickness_cm, s.quantity, p.unit, p.unit_price, p.photo_url,
                   p.photo_hd_url, p.notes
            FROM produtos p
            LEFT JOIN stock s ON s.product_id = p.id AND s.quantity > 0
            LEFT JOIN locais l ON l.id = s.location_id
            WHERE p.company_id = $1 AND p.is_active
            ORDER BY p.idmm, l.code
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;
        let rows = if reimportable_only {
            reimportable(rows)
        } else {
            rows
        };

        let bytes = match format {
            ExportFormat::Xlsx => write_xlsx(&rows)?,
            ExportFormat::Csv => write_csv(&rows)?,
        };
        let filename = format!(
            "stock_{}.{}",
            chrono::Utc::now().format("%Y%m%d"),
            format.extension()
        );

        tracing::debug!(%company_id, rows = rows.len(), ?format, "products exported");
        Ok((bytes, filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::{read_csv, read_workbook};

    fn sample() -> Vec<ExportRow> {
        vec![
            ExportRow {
                idmm: "MM-100".into(),
                location_code: Some("P1".into()),
                variety: "Estremoz".into(),
                kind: "slab".into(),
                finish: Some("Polido".into()),
                length_cm: Some(Decimal::from(300)),
                width_cm: Some(Decimal::from(200)),
                thickness_cm: Some(Decimal::from(2)),
                quantity: Some(Decimal::new(125, 1)),
                unit: "m2".into(),
                unit_price: None,
                photo_url: None,
                photo_hd_url: None,
                notes: None,
            },
            ExportRow {
                idmm: "MM-101".into(),
                location_code: None,
                variety: "Rosa Aurora".into(),
                kind: "block".into(),
                finish: None,
                length_cm: None,
                width_cm: None,
                thickness_cm: None,
                quantity: None,
                unit: "m3".into(),
                unit_price: Some(Decimal::from(900)),
                photo_url: None,
                photo_hd_url: None,
                notes: Some("sem stock".into()),
            },
        ]
    }

    fn headers() -> Vec<String> {
        ImportColumn::ALL.iter().map(|c| c.header().to_string()).collect()
    }

    #[test]
    fn xlsx_uses_the_import_layout() {
        let bytes = write_xlsx(&sample()).unwrap();
        let sheet = read_workbook(&bytes).unwrap();

        assert_eq!(sheet.headers, headers());
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], "MM-100");
        assert_eq!(sheet.rows[0][1], "P1");
        assert_eq!(sheet.rows[0][9], "12.5");
    }

    #[test]
    fn csv_uses_the_import_layout() {
        let bytes = write_csv(&sample()).unwrap();
        let sheet = read_csv(&bytes).unwrap();

        assert_eq!(sheet.headers, headers());
        assert_eq!(sheet.rows[0][9], "12.5");
        assert_eq!(sheet.rows[1][1], "");
        assert_eq!(sheet.rows[1][9], "0");
        assert_eq!(sheet.rows[1][14], "sem stock");
    }

    #[test]
    fn reimportable_rows_pass_import_validation() {
        let mut rows = sample();
        for code in ["P1", "P2"] {
            let mut spread = rows[0].clone();
            spread.idmm = "MM-102".into();
            spread.location_code = Some(code.into());
            rows.push(spread);
        }

        let kept = reimportable(rows);
        let idmms: Vec<&str> = kept.iter().map(|r| r.idmm.as_str()).collect();
        assert_eq!(idmms, vec!["MM-100"]);

        let sheet = read_csv(&write_csv(&kept).unwrap()).unwrap();
        let parsed = shared::import::parse_sheet_with_lines(
            &sheet.headers,
            &sheet.rows,
            &sheet.lines,
            100,
        )
        .unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.rows[0].is_valid(), "{:?}", parsed.rows[0].errors);
    }
}
