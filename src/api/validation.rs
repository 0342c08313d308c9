//! Простые функции валидации для входных DTO.
//! Позволяет раннее отбрасывание некорректных данных.

use regex::Regex;

use crate::errors::AppError;

pub const MAX_DOCUMENT_NUMBER_LEN: usize = 190;
pub const MAX_FORMAT_LEN: usize = 120;

lazy_static::lazy_static! {
    static ref CUSTOMER_SERIES_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,10}$").unwrap();
}

pub fn validate_customer_series(series: &str) -> bool {
    CUSTOMER_SERIES_RE.is_match(series)
}

pub fn ensure_max_len(value: &str, max: usize) -> bool {
    value.len() <= max
}

pub fn ensure_positive_id(name: &str, id: i64) -> Result<(), AppError> {
    if id > 0 {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("{} must be positive", name)))
    }
}

/// Номер, введённый вручную: без управляющих символов и с запасом под маркер удаления.
pub fn sanitize_document_number(number: &str) -> Option<String> {
    let trimmed = number.trim();
    if trimmed.is_empty()
        || !ensure_max_len(trimmed, MAX_DOCUMENT_NUMBER_LEN)
        || trimmed.chars().any(char::is_control)
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_series_charset() {
        assert!(validate_customer_series("DRJ"));
        assert!(validate_customer_series("cst_01"));
        assert!(!validate_customer_series(""));
        assert!(!validate_customer_series("WAY-TOO-LONG-1"));
        assert!(!validate_customer_series("a b"));
    }

    #[test]
    fn document_number_is_trimmed_and_bounded() {
        assert_eq!(sanitize_document_number("  INV-000001 ").as_deref(), Some("INV-000001"));
        assert_eq!(sanitize_document_number("   "), None);
        assert_eq!(sanitize_document_number("INV\n1"), None);
        assert_eq!(sanitize_document_number(&"9".repeat(MAX_DOCUMENT_NUMBER_LEN + 1)), None);
    }

    #[test]
    fn ids_must_be_positive() {
        assert!(ensure_positive_id("tenant_id", 1).is_ok());
        assert!(ensure_positive_id("tenant_id", 0).is_err());
    }
}
