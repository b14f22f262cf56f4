//! # Form Field Values
//!
//! A form field holds text, a number, or a flag. The JSON surface is
//! untagged: `"business-loan"`, `250000`, and `true` all deserialize
//! directly.
//!
//! "Empty" is defined here and only here: text is empty when it is blank
//! after trimming. Numbers and flags always count as answered, so
//! `isBusinessOwner = false` satisfies a required field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name → value. Ordered so snapshots and persisted JSON are stable.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// The value of a single form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Yes/no answer or consent checkbox.
    Flag(bool),
    /// Numeric answer (amounts, scores).
    Number(f64),
    /// Free text or a selected option id.
    Text(String),
}

impl FieldValue {
    /// Build a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Whether the field counts as unanswered for step validation.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Flag(_) => false,
        }
    }

    /// The trimmed text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.trim()),
            _ => None,
        }
    }

    /// The flag, if this is a flag value.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Render for text-typed storage columns. Whole numbers drop the
    /// fractional part (`250000`, not `250000.0`).
    pub fn to_storage_string(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn untagged_json_forms() {
        let v: FieldValue = serde_json::from_str("\"business-loan\"").unwrap();
        assert_eq!(v, FieldValue::text("business-loan"));
        let v: FieldValue = serde_json::from_str("250000").unwrap();
        assert_eq!(v, FieldValue::Number(250000.0));
        let v: FieldValue = serde_json::from_str("false").unwrap();
        assert_eq!(v, FieldValue::Flag(false));
    }

    #[test]
    fn false_flag_is_an_answer() {
        assert!(!FieldValue::Flag(false).is_empty());
    }

    #[test]
    fn storage_string_drops_trailing_zero() {
        assert_eq!(FieldValue::Number(250000.0).to_storage_string(), "250000");
        assert_eq!(FieldValue::Number(12.5).to_storage_string(), "12.5");
        assert_eq!(FieldValue::text("  Acme  ").to_storage_string(), "Acme");
        assert_eq!(FieldValue::Flag(true).to_storage_string(), "true");
    }

    proptest! {
        #[test]
        fn whitespace_only_text_is_empty(s in "[ \t\n]{0,12}") {
            prop_assert!(FieldValue::Text(s).is_empty());
        }

        #[test]
        fn text_with_visible_char_is_not_empty(prefix in "[ ]{0,4}", c in "[a-zA-Z0-9@.]", suffix in "[ ]{0,4}") {
            let text = format!("{prefix}{c}{suffix}");
            prop_assert!(!FieldValue::Text(text).is_empty());
        }
    }
}
