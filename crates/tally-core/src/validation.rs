//! # Validation Module
//!
//! Input validation for values that enter the register from outside:
//! cashier-typed quantities and cash amounts, and notification fields pushed
//! by the payment feed.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cashier UI                                                   │
//! │  └── Numpad never produces negative amounts                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Register services                                            │
//! │  └── THIS MODULE: amounts, references, labels                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL, CHECK and foreign key constraints                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PAYMENT_CENTS, MAX_SESSION_LINES};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length for customer labels and session notes.
pub const MAX_LABEL_LEN: usize = 120;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an explicit line quantity.
///
/// Zero and negative quantities are handled by the session queue as removal,
/// so this only rejects the upper bound.
///
/// ```rust
/// use tally_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents (incoming notification or manual
/// cash/card entry).
///
/// ```rust
/// use tally_core::validation::validate_payment_amount;
///
/// assert!(validate_payment_amount(500).is_ok());
/// assert!(validate_payment_amount(0).is_err());
/// assert!(validate_payment_amount(i64::MAX).is_err());
/// ```
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    if cents > MAX_PAYMENT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "payment amount".to_string(),
            min: 1,
            max: MAX_PAYMENT_CENTS,
        });
    }

    Ok(())
}

/// Validates a fixed tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates that a session can take one more distinct line.
pub fn validate_session_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_SESSION_LINES {
        return Err(ValidationError::OutOfRange {
            field: "session lines".to_string(),
            min: 0,
            max: MAX_SESSION_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a mobile-money reference code.
///
/// ## Rules
/// - Not empty
/// - 6 to 20 characters
/// - Uppercase letters and digits only
///
/// ```rust
/// use tally_core::validation::validate_reference;
///
/// assert!(validate_reference("QJL2X3KK9A").is_ok());
/// assert!(validate_reference("qjl2").is_err());
/// ```
pub fn validate_reference(reference: &str) -> ValidationResult<()> {
    let reference = reference.trim();

    if reference.is_empty() {
        return Err(ValidationError::Required {
            field: "reference".to_string(),
        });
    }

    if reference.len() < 6 || reference.len() > 20 {
        return Err(ValidationError::OutOfRange {
            field: "reference length".to_string(),
            min: 6,
            max: 20,
        });
    }

    if !reference
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ValidationError::InvalidFormat {
            field: "reference".to_string(),
            reason: "must contain only uppercase letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a sender phone number in international form (`+` and digits).
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "sender phone".to_string(),
            reason: "expected 7-15 digits, optionally prefixed with +".to_string(),
        });
    }

    Ok(())
}

/// Normalizes an optional free-text label (customer label, session note).
///
/// Blank input becomes `None`; overlong input is rejected.
pub fn normalize_label(field: &str, label: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };

    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    Ok(Some(label.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_ok());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_payment_amount(-100).is_err());
        assert!(validate_payment_amount(MAX_PAYMENT_CENTS).is_ok());
        assert!(validate_payment_amount(MAX_PAYMENT_CENTS + 1).is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("PLK9MNBV").is_ok());
        assert!(validate_reference("").is_err());
        assert!(validate_reference("ABC").is_err());
        assert!(validate_reference("HAS SPACE1").is_err());
        assert!(validate_reference(&"A".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+254712345678").is_ok());
        assert!(validate_phone("0712345678").is_ok());
        assert!(validate_phone("+25471-234").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("customer", None).unwrap(), None);
        assert_eq!(normalize_label("customer", Some("   ")).unwrap(), None);
        assert_eq!(
            normalize_label("customer", Some(" Table 4 ")).unwrap(),
            Some("Table 4".to_string())
        );
        assert!(normalize_label("customer", Some(&"x".repeat(200))).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(800).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_session_size() {
        assert!(validate_session_size(0).is_ok());
        assert!(validate_session_size(MAX_SESSION_LINES).is_err());
    }
}
