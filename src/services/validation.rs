//! Input checks shared by the money and shopping services.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;

/// Largest whole amount a single record may carry (fits NUMERIC(12,2))
const MAX_AMOUNT: i64 = 1_000_000_000;

/// A strictly positive amount with at most two decimal places
pub fn positive_amount(amount: Decimal, field: &str) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!("{} must be greater than zero", field)));
    }
    nonzero_amount(amount, field)
}

/// A non-zero amount of either sign with at most two decimal places
pub fn nonzero_amount(amount: Decimal, field: &str) -> AppResult<Decimal> {
    if amount.is_zero() {
        return Err(AppError::Validation(format!("{} must not be zero", field)));
    }
    if amount.abs() >= Decimal::from(MAX_AMOUNT) {
        return Err(AppError::Validation(format!("{} is too large", field)));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::Validation(format!(
            "{} can have at most two decimal places",
            field
        )));
    }
    Ok(amount)
}

/// Trimmed, non-empty text of bounded length
pub fn required_text(text: &str, field: &str, max_len: usize) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if text.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(text.to_string())
}

/// Trimmed optional text; blank becomes `None`
pub fn optional_text(text: Option<&str>, field: &str, max_len: usize) -> AppResult<Option<String>> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => required_text(t, field, max_len).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_positive_amount() {
        assert_eq!(positive_amount(dec("12.50"), "amount").unwrap(), dec("12.50"));
        assert!(positive_amount(dec("0"), "amount").is_err());
        assert!(positive_amount(dec("-1"), "amount").is_err());
        assert!(positive_amount(dec("1.005"), "amount").is_err());
        assert!(positive_amount(dec("1000000000"), "amount").is_err());
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        assert!(positive_amount(dec("3.1000"), "amount").is_ok());
    }

    #[test]
    fn test_nonzero_amount_allows_negative() {
        assert!(nonzero_amount(dec("-40"), "amount").is_ok());
        assert!(nonzero_amount(dec("0.00"), "amount").is_err());
    }

    #[test]
    fn test_text_rules() {
        assert_eq!(required_text("  rice ", "description", 10).unwrap(), "rice");
        assert!(required_text("   ", "description", 10).is_err());
        assert!(required_text("abcdefghijk", "description", 10).is_err());
        assert_eq!(optional_text(Some(" "), "note", 10).unwrap(), None);
        assert_eq!(optional_text(None, "note", 10).unwrap(), None);
        assert_eq!(optional_text(Some("ok"), "note", 10).unwrap().as_deref(), Some("ok"));
    }
}
