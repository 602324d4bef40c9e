//! `validator` adapters for the shared field checks

use std::borrow::Cow;

use validator::ValidationError;

fn to_error(code: &'static str, result: Result<(), &'static str>) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut err = ValidationError::new(code);
        err.message = Some(Cow::Borrowed(message));
        err
    })
}

pub fn company_code(value: &str) -> Result<(), ValidationError> {
    to_error("company_code", shared::validate_company_code(value))
}

pub fn password(value: &str) -> Result<(), ValidationError> {
    to_error("password", shared::validate_password(value))
}

pub fn nif(value: &str) -> Result<(), ValidationError> {
    to_error("nif", shared::validate_nif(value))
}

pub fn phone(value: &str) -> Result<(), ValidationError> {
    to_error("phone", shared::validate_pt_phone(value))
}

pub fn postal_code(value: &str) -> Result<(), ValidationError> {
    to_error("postal_code", shared::validate_pt_postal_code(value))
}

pub fn idmm(value: &str) -> Result<(), ValidationError> {
    to_error("idmm", shared::validate_idmm(&shared::normalize_idmm(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_carried() {
        let err = nif("123456780").unwrap_err();
        assert_eq!(err.code, "nif");
        assert!(err.message.is_some());
        assert!(nif("123456789").is_ok());
        assert!(idmm(" mm-01 ").is_ok());
    }
}
