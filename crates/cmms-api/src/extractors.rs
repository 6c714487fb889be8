//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs, a helper to extract
//! and validate JSON bodies in handlers, and the `nullable` field helper
//! for partial updates that must tell "absent" apart from `null`.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Deserialize a present field as `Some(value)`, where `value` may be `None`
/// for an explicit `null`. Pair with `#[serde(default)]` so an absent field
/// stays `None`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validate an optional short text field (present means non-blank, bounded).
pub fn check_text(field: &'static str, value: Option<&str>) -> Result<(), String> {
    match value {
        Some(v) => cmms_core::error::require_short_text(field, v).map_err(|e| e.to_string()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        parent: Option<Option<u32>>,
    }

    #[test]
    fn nullable_distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent, None);
        let null: Patch = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        assert_eq!(null.parent, Some(None));
        let set: Patch = serde_json::from_str(r#"{"parent": 7}"#).unwrap();
        assert_eq!(set.parent, Some(Some(7)));
    }

    #[test]
    fn check_text_skips_absent_fields() {
        assert!(check_text("name", None).is_ok());
        assert!(check_text("name", Some("Chiller")).is_ok());
        assert!(check_text("name", Some("  ")).is_err());
    }
}
