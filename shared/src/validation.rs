//! Validation utilities for the Stone Stock platform
//!
//! Includes Portugal-specific validations (NIF, postal codes, phone numbers) and the
//! lenient number/dimension parsing used by spreadsheet imports.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::models::Dimensions;

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate company code format (3-10 uppercase alphanumeric)
pub fn validate_company_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Company code must be at least 3 characters");
    }
    if code.len() > 10 {
        return Err("Company code must be at most 10 characters");
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err("Company code must be uppercase alphanumeric only");
    }
    Ok(())
}

// ============================================================================
// Product Validations
// ============================================================================

/// Maximum length of an IDMM code
pub const IDMM_MAX_LEN: usize = 32;

/// Normalize an IDMM code (trim and uppercase)
pub fn normalize_idmm(idmm: &str) -> String {
    idmm.trim().to_uppercase()
}

/// Validate a normalized IDMM code
pub fn validate_idmm(idmm: &str) -> Result<(), &'static str> {
    if idmm.is_empty() {
        return Err("IDMM is required");
    }
    if idmm.len() > IDMM_MAX_LEN {
        return Err("IDMM must be at most 32 characters");
    }
    if !idmm
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '-' | '/' | '.' | '_'))
    {
        return Err("IDMM may only contain letters, digits and - / . _");
    }
    Ok(())
}

// ============================================================================
// Portugal-Specific Validations
// ============================================================================

/// Validate a Portuguese tax number (NIF / NIPC)
/// 9 digits, mod-11 check digit
pub fn validate_nif(nif: &str) -> Result<(), &'static str> {
    let digits: Vec<u32> = nif
        .trim()
        .trim_start_matches("PT")
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(10).ok_or("NIF must contain only digits"))
        .collect::<Result<_, _>>()?;

    if digits.len() != 9 {
        return Err("NIF must be 9 digits");
    }

    if !matches!(digits[0], 1 | 2 | 3 | 5 | 6 | 8 | 9) {
        return Err("Invalid NIF prefix");
    }

    let sum: u32 = digits
        .iter()
        .take(8)
        .enumerate()
        .map(|(i, d)| d * (9 - i as u32))
        .sum();
    let check = match 11 - (sum % 11) {
        10 | 11 => 0,
        c => c,
    };

    if check != digits[8] {
        return Err("Invalid NIF check digit");
    }
    Ok(())
}

/// Validate Portuguese postal code format (NNNN-NNN)
pub fn validate_pt_postal_code(code: &str) -> Result<(), &'static str> {
    let code = code.trim();
    let valid = code.len() == 8
        && code.char_indices().all(|(i, c)| {
            if i == 4 {
                c == '-'
            } else {
                c.is_ascii_digit()
            }
        });
    if valid {
        Ok(())
    } else {
        Err("Postal code must be in format NNNN-NNN")
    }
}

/// Validate Portuguese phone number format
/// Accepts: 912345678, 912 345 678, +351912345678, 00351 212345678
pub fn validate_pt_phone(phone: &str) -> Result<(), &'static str> {
    let compact: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let national = compact
        .strip_prefix("+351")
        .or_else(|| compact.strip_prefix("00351"))
        .unwrap_or(&compact);

    if national.len() == 9
        && national.chars().all(|c| c.is_ascii_digit())
        && (national.starts_with('2') || national.starts_with('9'))
    {
        return Ok(());
    }

    Err("Invalid Portuguese phone number format")
}

// ============================================================================
// Text Helpers
// ============================================================================

/// Replace Portuguese diacritics with their ASCII base letter
pub fn fold_accents(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'ª' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'º' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Parse a number written either with a decimal comma or a decimal point
///
/// When both separators appear, the last one is the decimal separator. A separator
/// repeated more than once is treated as a thousands separator.
pub fn parse_decimal_pt(input: &str) -> Result<Decimal, &'static str> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return Err("Empty number");
    }

    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();

    let normalized = match (commas, dots) {
        (0, 0) => compact,
        (0, 1) => compact,
        (1, 0) => compact.replace(',', "."),
        (0, _) => compact.replace('.', ""),
        (_, 0) => compact.replace(',', ""),
        _ => {
            let last_comma = compact.rfind(',').unwrap_or(0);
            let last_dot = compact.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                compact.replace('.', "").replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
    };

    Decimal::from_str(&normalized).map_err(|_| "Invalid number")
}

// ============================================================================
// Dimensions
// ============================================================================

/// Length units accepted in dimension strings and column headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthUnit {
    Millimetre,
    #[default]
    Centimetre,
    Metre,
}

impl LengthUnit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim().to_ascii_lowercase().as_str() {
            "mm" => Some(LengthUnit::Millimetre),
            "cm" => Some(LengthUnit::Centimetre),
            "m" => Some(LengthUnit::Metre),
            _ => None,
        }
    }

    pub fn to_cm(&self, value: Decimal) -> Decimal {
        match self {
            LengthUnit::Millimetre => value / Decimal::from(10),
            LengthUnit::Centimetre => value,
            LengthUnit::Metre => value * Decimal::from(100),
        }
    }
}

/// Parse a dimension string such as "300 x 200 x 2", "300X150", "3,05*1,80 m" or "3000×1800×20mm"
///
/// Components default to centimetres; a unit suffix on the last component applies to
/// every component without its own suffix.
pub fn parse_dimensions(input: &str) -> Result<Dimensions, &'static str> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        return Err("Empty dimensions");
    }

    let mut parts: Vec<(Decimal, Option<LengthUnit>)> = Vec::with_capacity(3);
    for raw in text.split(['x', '×', '*']) {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Dimensions contain an empty component");
        }
        let split_at = raw
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(raw.len());
        let (number, suffix) = raw.split_at(split_at);
        let unit = if suffix.trim().is_empty() {
            None
        } else {
            Some(LengthUnit::from_suffix(suffix).ok_or("Unknown length unit in dimensions")?)
        };
        let value = parse_decimal_pt(number).map_err(|_| "Invalid number in dimensions")?;
        if value <= Decimal::ZERO {
            return Err("Dimensions must be positive");
        }
        parts.push((value, unit));
    }

    if parts.len() < 2 || parts.len() > 3 {
        return Err("Dimensions must have 2 or 3 components");
    }

    let default_unit = parts
        .iter()
        .rev()
        .find_map(|(_, u)| *u)
        .unwrap_or_default();
    let cm: Vec<Decimal> = parts
        .iter()
        .map(|(v, u)| u.unwrap_or(default_unit).to_cm(*v))
        .collect();

    Ok(Dimensions {
        length_cm: Some(cm[0]),
        width_cm: Some(cm[1]),
        thickness_cm: cm.get(2).copied(),
    })
}
