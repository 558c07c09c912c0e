//! Custom identifier encoding.
//!
//! A component sent in a response carries `base:reference`, where `base` is
//! the identifier the component was registered under and `reference` is the
//! opaque invocation reference minted for that particular response. Only the
//! first delimiter is significant.

use crate::error::{ModelError, ModelResult};

/// Separates the registered identifier from the invocation reference.
pub const REFERENCE_DELIMITER: char = ':';

/// Maximum length of a custom identifier on the wire.
pub const MAX_CUSTOM_ID_LEN: usize = 100;

/// Length of a minted invocation reference (a simple-format UUID).
pub const REFERENCE_LEN: usize = 32;

/// Maximum length of a registered base identifier, leaving room for the
/// delimiter and a reference.
pub const MAX_BASE_ID_LEN: usize = MAX_CUSTOM_ID_LEN - REFERENCE_LEN - 1;

/// A custom identifier split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomId<'a> {
    /// Registered component identifier.
    pub base: &'a str,
    /// Invocation reference, if one was attached.
    pub reference: Option<&'a str>,
}

/// Splits a raw custom identifier on the first delimiter.
///
/// An empty reference (`"base:"`) is treated as absent.
pub fn split_custom_id(raw: &str) -> CustomId<'_> {
    match raw.split_once(REFERENCE_DELIMITER) {
        Some((base, reference)) if !reference.is_empty() => CustomId {
            base,
            reference: Some(reference),
        },
        Some((base, _)) => CustomId {
            base,
            reference: None,
        },
        None => CustomId {
            base: raw,
            reference: None,
        },
    }
}

/// Appends an invocation reference to a base identifier.
pub fn join_custom_id(base: &str, reference: &str) -> String {
    let mut id = String::with_capacity(base.len() + reference.len() + 1);
    id.push_str(base);
    id.push(REFERENCE_DELIMITER);
    id.push_str(reference);
    id
}

/// Checks that `base` can be registered as a component identifier.
pub fn validate_base_id(base: &str) -> ModelResult<()> {
    if base.is_empty() {
        return Err(ModelError::invalid_custom_id(base, "must not be empty"));
    }
    if base.contains(REFERENCE_DELIMITER) {
        return Err(ModelError::invalid_custom_id(
            base,
            format!("must not contain '{REFERENCE_DELIMITER}'"),
        ));
    }
    if base.chars().count() > MAX_BASE_ID_LEN {
        return Err(ModelError::invalid_custom_id(
            base,
            format!("must be at most {MAX_BASE_ID_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_first_delimiter_only() {
        let id = split_custom_id("counter:abc:def");
        assert_eq!(id.base, "counter");
        assert_eq!(id.reference, Some("abc:def"));
    }

    #[test]
    fn split_without_reference() {
        assert_eq!(split_custom_id("counter").reference, None);
        assert_eq!(split_custom_id("counter:").reference, None);
        assert_eq!(split_custom_id("counter:").base, "counter");
    }

    #[test]
    fn join_then_split_recovers_parts() {
        let raw = join_custom_id("delete", "0f8fad5bd9cb469fa16570867728950e");
        let id = split_custom_id(&raw);
        assert_eq!(id.base, "delete");
        assert_eq!(id.reference, Some("0f8fad5bd9cb469fa16570867728950e"));
    }

    #[test]
    fn base_id_validation() {
        assert!(validate_base_id("counter").is_ok());
        assert!(validate_base_id("").is_err());
        assert!(validate_base_id("a:b").is_err());
        assert!(validate_base_id(&"x".repeat(MAX_BASE_ID_LEN + 1)).is_err());
    }
}
