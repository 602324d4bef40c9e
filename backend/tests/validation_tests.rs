//! Input validation tests
//!
//! Portuguese identifiers (NIF, postal codes, phones), account fields, product codes
//! and dimension strings.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::validation::*;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_nif() {
        assert!(validate_nif("123456789").is_ok());
        assert!(validate_nif("501964843").is_ok());
        assert!(validate_nif("123456780").is_err());
        assert!(validate_nif("1234567890").is_err());
        assert!(validate_nif("12345678A").is_err());
        // Check digits are right; only the prefix is not allowed
        assert!(validate_nif("700000003").is_err());
        assert!(validate_nif("450000001").is_err());
        assert!(validate_nif("412345678").is_err());
    }

    #[test]
    fn test_postal_code() {
        assert!(validate_pt_postal_code("7100-123").is_ok());
        assert!(validate_pt_postal_code(" 1000-001 ").is_ok());
        assert!(validate_pt_postal_code("7100123").is_err());
        assert!(validate_pt_postal_code("710-1234").is_err());
        assert!(validate_pt_postal_code("7100-12A").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(validate_pt_phone("912345678").is_ok());
        assert!(validate_pt_phone("268 123 456").is_ok());
        assert!(validate_pt_phone("+351912345678").is_ok());
        assert!(validate_pt_phone("00351 212345678").is_ok());
        assert!(validate_pt_phone("812345678").is_err());
        assert!(validate_pt_phone("91234567").is_err());
        assert!(validate_pt_phone("+34912345678").is_err());
    }

    #[test]
    fn test_email_and_password() {
        assert!(validate_email("gestor@marmores.pt").is_ok());
        assert!(validate_email("gestor@local").is_err());
        assert!(validate_email("@marmores.pt").is_err());

        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
    }

    #[test]
    fn test_company_code() {
        assert!(validate_company_code("MRM").is_ok());
        assert!(validate_company_code("ESTREMOZ01").is_ok());
        assert!(validate_company_code("MR").is_err());
        assert!(validate_company_code("ESTREMOZ001").is_err());
        assert!(validate_company_code("mrm").is_err());
        assert!(validate_company_code("MR-1").is_err());
    }

    #[test]
    fn test_idmm() {
        assert_eq!(normalize_idmm("  mm-12/a "), "MM-12/A");
        assert!(validate_idmm("MM-12/A").is_ok());
        assert!(validate_idmm("").is_err());
        assert!(validate_idmm("MM 12").is_err());
        assert!(validate_idmm(&"A".repeat(IDMM_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_decimal_parsing() {
        assert_eq!(parse_decimal_pt("12,5").unwrap(), dec("12.5"));
        assert_eq!(parse_decimal_pt("12.5").unwrap(), dec("12.5"));
        assert_eq!(parse_decimal_pt("1.234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_decimal_pt("1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_decimal_pt("1.234.567").unwrap(), dec("1234567"));
        assert!(parse_decimal_pt("").is_err());
        assert!(parse_decimal_pt("abc").is_err());
    }

    #[test]
    fn test_dimensions() {
        let d = parse_dimensions("300 x 200 x 2").unwrap();
        assert_eq!(d.length_cm, Some(dec("300")));
        assert_eq!(d.width_cm, Some(dec("200")));
        assert_eq!(d.thickness_cm, Some(dec("2")));
        assert_eq!(d.area_m2(), Some(dec("6")));
        assert_eq!(d.volume_m3(), Some(dec("0.12")));

        let metres = parse_dimensions("3,05*1,80 m").unwrap();
        assert_eq!(metres.length_cm, Some(dec("305")));
        assert_eq!(metres.width_cm, Some(dec("180")));
        assert_eq!(metres.thickness_cm, None);

        let mm = parse_dimensions("3000×1800×20mm").unwrap();
        assert_eq!(mm.thickness_cm, Some(dec("2")));

        assert!(parse_dimensions("300").is_err());
        assert!(parse_dimensions("300 x 0").is_err());
        assert!(parse_dimensions("300 x 200 x 2 x 1").is_err());
        assert!(parse_dimensions("300 x 200 pol").is_err());
    }

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Armazém Pêro Pinheiro"), "Armazem Pero Pinheiro");
        assert_eq!(fold_accents("Camões"), "Camoes");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn postal_code_strategy() -> impl Strategy<Value = String> {
    (1000u32..=9999, 0u32..=999).prop_map(|(a, b)| format!("{:04}-{:03}", a, b))
}

fn mobile_strategy() -> impl Strategy<Value = String> {
    (90_000_000u32..=99_999_999).prop_map(|n| n.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_postal_codes_accepted(code in postal_code_strategy()) {
        prop_assert!(validate_pt_postal_code(&code).is_ok());
    }

    #[test]
    fn prop_phone_prefixes_accepted(number in mobile_strategy()) {
        prop_assert!(validate_pt_phone(&number).is_ok());
        let with_country = format!("+351{}", number);
        let with_zeros = format!("00351{}", number);
        prop_assert!(validate_pt_phone(&with_country).is_ok());
        prop_assert!(validate_pt_phone(&with_zeros).is_ok());
    }

    /// A wrong check digit always invalidates a NIF
    #[test]
    fn prop_nif_single_check_digit(body in 10_000_000u32..=19_999_999) {
        let valid = (0..=9u32)
            .filter(|d| validate_nif(&format!("{}{}", body, d)).is_ok())
            .count();
        prop_assert_eq!(valid, 1);
    }

    #[test]
    fn prop_decimal_comma_equals_point(int in 0u32..100_000, frac in 0u32..1000) {
        let comma = format!("{},{:03}", int, frac);
        let point = format!("{}.{:03}", int, frac);
        prop_assert_eq!(parse_decimal_pt(&comma).unwrap(), parse_decimal_pt(&point).unwrap());
    }
}
