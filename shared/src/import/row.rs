//! Row-level parsing and validation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{HeaderMap, ImportColumn, ImportError};
use crate::models::{Dimensions, ProductKind, StockUnit};
use crate::validation::{normalize_idmm, parse_decimal_pt, parse_dimensions, validate_idmm};

/// A validated spreadsheet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    /// 1-based sheet line (header is line 1)
    pub line: usize,
    pub idmm: String,
    pub location: String,
    pub variety: Option<String>,
    pub kind: Option<ProductKind>,
    pub finish: Option<String>,
    pub dimensions: Dimensions,
    pub quantity: Decimal,
    pub unit: Option<StockUnit>,
    pub unit_price: Option<Decimal>,
    pub photo_url: Option<String>,
    pub photo_hd_url: Option<String>,
    pub notes: Option<String>,
    /// The quantity was computed from the dimensions
    pub quantity_derived: bool,
}

/// Result of parsing one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowOutcome {
    pub line: usize,
    pub idmm: Option<String>,
    pub row: Option<ImportRow>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RowOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.row.is_some()
    }
}

/// All rows of a sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSheet {
    pub rows: Vec<RowOutcome>,
    /// Sheet-level warnings (unknown columns, skipped rows)
    pub warnings: Vec<String>,
}

fn parse_length(
    headers: &HeaderMap,
    cells: &[String],
    column: ImportColumn,
    errors: &mut Vec<String>,
) -> Option<Decimal> {
    let raw = headers.cell(cells, column)?;
    match parse_decimal_pt(raw) {
        Ok(v) if v > Decimal::ZERO => Some(headers.unit(column).to_cm(v)),
        Ok(_) => {
            errors.push(format!("{} must be positive", column.header()));
            None
        }
        Err(_) => {
            errors.push(format!("{} '{}' is not a number", column.header(), raw));
            None
        }
    }
}

fn parse_url(raw: Option<&str>, column: ImportColumn, warnings: &mut Vec<String>) -> Option<String> {
    let raw = raw?;
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Some(raw.to_string())
    } else {
        warnings.push(format!("{} '{}' is not a URL and was ignored", column.header(), raw));
        None
    }
}

/// Parse one data row; returns `None` for blank rows
pub fn parse_row(headers: &HeaderMap, line: usize, cells: &[String]) -> Option<RowOutcome> {
    if cells.iter().all(|c| c.trim().is_empty()) {
        return None;
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let idmm = headers.cell(cells, ImportColumn::Idmm).map(normalize_idmm);
    match &idmm {
        None => errors.push("ID_MM is required".to_string()),
        Some(code) => {
            if let Err(e) = validate_idmm(code) {
                errors.push(format!("ID_MM '{}': {}", code, e));
            }
        }
    }

    let location = headers.cell(cells, ImportColumn::Location).map(str::to_string);
    if location.is_none() {
        errors.push("Localizacao is required".to_string());
    }

    let kind = match headers.cell(cells, ImportColumn::Kind) {
        None => None,
        Some(raw) => {
            let parsed = ProductKind::parse_loose(raw);
            if parsed.is_none() {
                errors.push(format!("Tipo '{}' is not one of Bloco, Chapa, Ladrilho", raw));
            }
            parsed
        }
    };

    let unit = match headers.cell(cells, ImportColumn::Unit) {
        None => None,
        Some(raw) => {
            let parsed = StockUnit::parse_loose(raw);
            if parsed.is_none() {
                errors.push(format!("Unidade '{}' is not one of m2, m3, ton, un", raw));
            }
            parsed
        }
    };

    // Separate columns win over the combined dimension string
    let mut dimensions = match headers.cell(cells, ImportColumn::Dimensions) {
        None => Dimensions::default(),
        Some(raw) => match parse_dimensions(raw) {
            Ok(d) => d,
            Err(e) => {
                errors.push(format!("Dimensoes '{}': {}", raw, e));
                Dimensions::default()
            }
        },
    };
    if let Some(v) = parse_length(headers, cells, ImportColumn::Length, &mut errors) {
        dimensions.length_cm = Some(v);
    }
    if let Some(v) = parse_length(headers, cells, ImportColumn::Width, &mut errors) {
        dimensions.width_cm = Some(v);
    }
    if let Some(v) = parse_length(headers, cells, ImportColumn::Thickness, &mut errors) {
        dimensions.thickness_cm = Some(v);
    }
    if dimensions.is_empty() {
        warnings.push("no dimensions given".to_string());
    }

    let effective_unit = unit.or_else(|| kind.map(|k| k.default_unit()));
    let mut quantity_derived = false;
    let quantity = match headers.cell(cells, ImportColumn::Quantity) {
        Some(raw) => match parse_decimal_pt(raw) {
            Ok(q) if q < Decimal::ZERO => {
                errors.push(format!("Quantidade '{}' cannot be negative", raw));
                None
            }
            Ok(q) => Some(q),
            Err(_) => {
                errors.push(format!("Quantidade '{}' is not a number", raw));
                None
            }
        },
        None => match effective_unit.and_then(|u| dimensions.quantity_for(u)) {
            Some(q) => {
                quantity_derived = true;
                warnings.push(format!(
                    "quantity derived from dimensions: {} {}",
                    q.round_dp(3).normalize(),
                    effective_unit.map(|u| u.as_str()).unwrap_or_default()
                ));
                Some(q.round_dp(3))
            }
            None => {
                errors.push("Quantidade is required".to_string());
                None
            }
        },
    };

    let unit_price = match headers.cell(cells, ImportColumn::Price) {
        None => None,
        Some(raw) => match parse_decimal_pt(raw.trim_end_matches('€').trim()) {
            Ok(p) if p >= Decimal::ZERO => Some(p),
            _ => {
                errors.push(format!("Preco '{}' is not a valid price", raw));
                None
            }
        },
    };

    let photo_url = parse_url(
        headers.cell(cells, ImportColumn::Photo),
        ImportColumn::Photo,
        &mut warnings,
    );
    let photo_hd_url = parse_url(
        headers.cell(cells, ImportColumn::PhotoHd),
        ImportColumn::PhotoHd,
        &mut warnings,
    );

    let row = match (&idmm, &location, quantity) {
        (Some(idmm), Some(location), Some(quantity)) if errors.is_empty() => Some(ImportRow {
            line,
            idmm: idmm.clone(),
            location: location.clone(),
            variety: headers.cell(cells, ImportColumn::Variety).map(str::to_string),
            kind,
            finish: headers.cell(cells, ImportColumn::Finish).map(str::to_string),
            dimensions,
            quantity,
            unit,
            unit_price,
            photo_url,
            photo_hd_url,
            notes: headers.cell(cells, ImportColumn::Notes).map(str::to_string),
            quantity_derived,
        }),
        _ => None,
    };

    Some(RowOutcome {
        line,
        idmm,
        row,
        errors,
        warnings,
    })
}

/// Parse a whole sheet whose header is line 1 and whose data rows follow without gaps
pub fn parse_sheet(
    headers: &[String],
    rows: &[Vec<String>],
    max_rows: usize,
) -> Result<ParsedSheet, ImportError> {
    let lines: Vec<usize> = (2..rows.len() + 2).collect();
    parse_sheet_with_lines(headers, rows, &lines, max_rows)
}

/// Parse a sheet where `lines[i]` is the 1-based file line of `rows[i]`
pub fn parse_sheet_with_lines(
    headers: &[String],
    rows: &[Vec<String>],
    lines: &[usize],
    max_rows: usize,
) -> Result<ParsedSheet, ImportError> {
    let map = HeaderMap::from_headers(headers)?;

    let non_blank = rows
        .iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
        .count();
    if non_blank > max_rows {
        return Err(ImportError::TooManyRows {
            max: max_rows,
            found: non_blank,
        });
    }

    let mut warnings: Vec<String> = map
        .unknown
        .iter()
        .map(|h| format!("column '{}' is not recognised and was ignored", h))
        .collect();

    let mut blank = 0;
    let mut outcomes = Vec::with_capacity(non_blank);
    for (cells, &line) in rows.iter().zip(lines) {
        match parse_row(&map, line, cells) {
            Some(outcome) => outcomes.push(outcome),
            None => blank += 1,
        }
    }
    if blank > 0 {
        warnings.push(format!("{} blank rows skipped", blank));
    }

    Ok(ParsedSheet {
        rows: outcomes,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn headers() -> HeaderMap {
        HeaderMap::from_headers(&[
            "ID_MM",
            "Localizacao",
            "Variedade",
            "Tipo",
            "Dimensoes",
            "Quantidade",
            "Foto",
        ])
        .unwrap()
    }

    #[test]
    fn valid_row() {
        let outcome = parse_row(
            &headers(),
            2,
            &cells(&["mm-001", "P1", "Estremoz", "Chapa", "300x200x2", "6,5", "https://x/y.jpg"]),
        )
        .unwrap();
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        let row = outcome.row.unwrap();
        assert_eq!(row.idmm, "MM-001");
        assert_eq!(row.kind, Some(ProductKind::Slab));
        assert_eq!(row.quantity, Decimal::from_str("6.5").unwrap());
        assert_eq!(row.photo_url.as_deref(), Some("https://x/y.jpg"));
    }

    #[test]
    fn quantity_derived_for_blocks() {
        let outcome = parse_row(
            &headers(),
            3,
            &cells(&["B-7", "P2", "Rosa Aurora", "Bloco", "300 x 200 x 150", "", ""]),
        )
        .unwrap();
        let row = outcome.row.unwrap();
        assert!(row.quantity_derived);
        assert_eq!(row.quantity, Decimal::from(9));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn errors_block_the_row() {
        let outcome = parse_row(
            &headers(),
            4,
            &cells(&["", "P1", "Estremoz", "Pedra", "abc", "-1", "foto.jpg"]),
        )
        .unwrap();
        assert!(outcome.row.is_none());
        assert_eq!(outcome.errors.len(), 4);
        assert!(outcome.warnings.iter().any(|w| w.contains("not a URL")));
    }

    #[test]
    fn blank_rows_are_skipped() {
        assert!(parse_row(&headers(), 5, &cells(&["", " ", "", "", "", "", ""])).is_none());
    }
}
