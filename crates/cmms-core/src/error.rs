//! # Error Hierarchy
//!
//! Structured error types for the CMMS stack, built with `thiserror`.
//!
//! Field-level problems are [`ValidationError`]s; they are recoverable and
//! surface to API clients as 422 responses. [`CmmsError`] wraps everything
//! the core can fail with.

use thiserror::Error;

/// Top-level error type for the core crate.
#[derive(Error, Debug)]
pub enum CmmsError {
    /// Field or enumeration validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation errors for record fields and closed enumerations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A choice field received a value outside its closed set.
    #[error("invalid {field}: \"{value}\" (expected one of: {})", .allowed.join(", "))]
    InvalidChoice {
        /// Name of the field being parsed.
        field: &'static str,
        /// The rejected input.
        value: String,
        /// The accepted wire values.
        allowed: &'static [&'static str],
    },

    /// A required text field was empty after trimming.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A text field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Name of the field.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },

    /// A date string was not a valid `YYYY-MM-DD` calendar date.
    #[error("invalid date: \"{value}\" ({reason})")]
    InvalidDate {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Maximum length of short text columns (names, model, serial, part number).
pub const MAX_SHORT_TEXT: usize = 255;

/// Check that `value` is non-empty after trimming and within [`MAX_SHORT_TEXT`].
pub fn require_short_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if trimmed.chars().count() > MAX_SHORT_TEXT {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_SHORT_TEXT,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_choice_lists_allowed_values() {
        let err = ValidationError::InvalidChoice {
            field: "priority",
            value: "urgent".to_string(),
            allowed: &["low", "medium", "high"],
        };
        assert_eq!(
            err.to_string(),
            "invalid priority: \"urgent\" (expected one of: low, medium, high)"
        );
    }

    #[test]
    fn cmms_error_wraps_validation() {
        let err = CmmsError::from(ValidationError::EmptyField("name"));
        assert!(err.to_string().contains("name must not be empty"));
    }

    #[test]
    fn require_short_text_rejects_blank() {
        assert_eq!(
            require_short_text("name", "   "),
            Err(ValidationError::EmptyField("name"))
        );
    }

    #[test]
    fn require_short_text_rejects_overlong() {
        let long = "x".repeat(MAX_SHORT_TEXT + 1);
        assert!(matches!(
            require_short_text("serial", &long),
            Err(ValidationError::TooLong { field: "serial", .. })
        ));
        assert!(require_short_text("serial", &"x".repeat(MAX_SHORT_TEXT)).is_ok());
    }
}
