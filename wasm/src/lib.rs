//! WebAssembly module for the Stone Stock platform
//!
//! Runs the import checks in the browser so a spreadsheet can be previewed before
//! it is uploaded:
//! - Row validation and location matching
//! - Dimension parsing
//! - Area and volume calculation

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::import::{parse_sheet, LocationMatch, LocationMatcher, LocationRef, RowOutcome};
use shared::Dimensions;
use wasm_bindgen::prelude::*;

/// Rows accepted in one browser-side validation
pub const MAX_PREVIEW_ROWS: usize = 5000;

#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("stone-stock wasm loaded"));
}

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

#[derive(Debug, Serialize)]
struct RowCheck {
    #[serde(flatten)]
    outcome: RowOutcome,
    location: Option<LocationMatch>,
}

#[derive(Debug, Serialize)]
struct SheetCheck {
    rows: Vec<RowCheck>,
    warnings: Vec<String>,
    valid_rows: usize,
    invalid_rows: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty(()),
}

impl Cell {
    fn into_text(self) -> String {
        match self {
            Cell::Text(s) => s,
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Empty(()) => String::new(),
        }
    }
}

fn check_sheet(headers_json: &str, rows_json: &str, locations_json: &str) -> Result<SheetCheck, String> {
    let headers: Vec<String> =
        serde_json::from_str(headers_json).map_err(|e| format!("Invalid headers JSON: {}", e))?;
    let rows: Vec<Vec<Cell>> =
        serde_json::from_str(rows_json).map_err(|e| format!("Invalid rows JSON: {}", e))?;
    let locations: Vec<LocationRef> = serde_json::from_str(locations_json)
        .map_err(|e| format!("Invalid locations JSON: {}", e))?;

    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|r| r.into_iter().map(Cell::into_text).collect())
        .collect();
    let sheet = parse_sheet(&headers, &rows, MAX_PREVIEW_ROWS).map_err(|e| e.to_string())?;
    let matcher = LocationMatcher::new(&locations);

    let rows: Vec<RowCheck> = sheet
        .rows
        .into_iter()
        .map(|outcome| {
            let location = outcome.row.as_ref().map(|r| matcher.find(&r.location));
            RowCheck { outcome, location }
        })
        .collect();
    let valid_rows = rows
        .iter()
        .filter(|r| {
            r.outcome.is_valid() && r.location.as_ref().and_then(|l| l.location()).is_some()
        })
        .count();

    Ok(SheetCheck {
        invalid_rows: rows.len() - valid_rows,
        valid_rows,
        rows,
        warnings: sheet.warnings,
    })
}

/// Validate sheet rows and match their locations
///
/// Takes the header row, the data rows (arrays of strings or numbers) and the
/// company's locations, all as JSON. Returns a JSON report with one entry per
/// non-blank row.
#[wasm_bindgen]
pub fn validate_import_sheet(
    headers_json: &str,
    rows_json: &str,
    locations_json: &str,
) -> Result<String, JsValue> {
    let report = check_sheet(headers_json, rows_json, locations_json).map_err(js_error)?;
    serde_json::to_string(&report).map_err(|e| js_error(e.to_string()))
}

fn dimensions_json(text: &str) -> Result<String, String> {
    let dimensions = shared::parse_dimensions(text).map_err(str::to_string)?;
    serde_json::to_string(&dimensions).map_err(|e| e.to_string())
}

/// Parse "300 x 200 x 2", "3,05*1,80 m" and similar into centimetres (JSON)
#[wasm_bindgen]
pub fn parse_dimensions_cm(text: &str) -> Result<String, JsValue> {
    dimensions_json(text).map_err(js_error)
}

/// Canonical form of a location code, as used for matching
#[wasm_bindgen]
pub fn normalize_location(text: &str) -> String {
    shared::import::normalize_location_code(text)
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok().filter(|d| *d > Decimal::ZERO)
}

/// Face area in m² from length and width in centimetres
#[wasm_bindgen]
pub fn area_m2(length_cm: f64, width_cm: f64) -> Option<f64> {
    Dimensions {
        length_cm: to_decimal(length_cm),
        width_cm: to_decimal(width_cm),
        thickness_cm: None,
    }
    .area_m2()?
    .to_f64()
}

/// Volume in m³ from three dimensions in centimetres
#[wasm_bindgen]
pub fn volume_m3(length_cm: f64, width_cm: f64, thickness_cm: f64) -> Option<f64> {
    Dimensions {
        length_cm: to_decimal(length_cm),
        width_cm: to_decimal(width_cm),
        thickness_cm: to_decimal(thickness_cm),
    }
    .volume_m3()?
    .to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATIONS: &str = r#"[
        {"id": "6f1c9a52-8f4e-4b8a-9a53-2d0c1a7e4b11", "code": "P1", "name": "Parque 1"},
        {"id": "0b6d2f3e-5c7a-4e1d-8f2b-9a4c3e6d7f22", "code": "P2", "name": "Parque 2"}
    ]"#;

    #[test]
    fn test_sheet_check() {
        let headers = r#"["ID_MM", "Localizacao", "Variedade", "Quantidade"]"#;
        let rows = r#"[
            ["A1", "parque 01", "Estremoz", 12.5],
            ["A2", "P9", "Estremoz", "3"],
            ["", null, null, null]
        ]"#;

        let report = check_sheet(headers, rows, LOCATIONS).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.valid_rows, 1);
        assert_eq!(report.invalid_rows, 1);
        assert_eq!(report.rows[1].location, Some(LocationMatch::NotFound));
        assert!(report.warnings.iter().any(|w| w.contains("blank")));

        let json: serde_json::Value =
            serde_json::from_str(&validate_import_sheet(headers, rows, LOCATIONS).unwrap()).unwrap();
        assert_eq!(json["rows"][0]["location"]["status"], "exact");
        assert_eq!(json["rows"][0]["line"], 2);
    }

    #[test]
    fn test_sheet_check_rejects_bad_input() {
        assert!(check_sheet("[", "[]", "[]").is_err());
        assert!(check_sheet(r#"["Quantidade"]"#, "[]", "[]").is_err());
    }

    #[test]
    fn test_dimensions() {
        let json: serde_json::Value =
            serde_json::from_str(&dimensions_json("30 x 20 x 2 mm").unwrap()).unwrap();
        let length: Decimal = json["length_cm"].as_str().unwrap().parse().unwrap();
        assert_eq!(length, Decimal::from(3));
        assert!(dimensions_json("30").is_err());
    }

    #[test]
    fn test_area_and_volume() {
        assert_eq!(area_m2(300.0, 200.0), Some(6.0));
        assert!((volume_m3(300.0, 200.0, 2.0).unwrap() - 0.12).abs() < 1e-9);
        assert_eq!(area_m2(0.0, 200.0), None);
        assert_eq!(normalize_location("Parque 01"), "P1");
    }
}
