//! Value Objects for the Position Sizer Domain
//!
//! Field values are raw edited text and are never rejected. Numeric
//! interpretation is permissive: anything that does not parse becomes NaN,
//! which then flows through the formulas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// No field is registered under this name
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Lock operation on a field that has no lock
    #[error("Field is not lockable: {0}")]
    NotLockable(String),
}

// =============================================================================
// FieldValue
// =============================================================================

/// Current value of a field, as edited.
///
/// An empty value stands for "not entered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValue(String);

impl FieldValue {
    /// Wrap raw edited text
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The empty value
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Raw text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when nothing (or only whitespace) was entered
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Numeric interpretation of the value
    ///
    /// Returns NaN for empty or non-numeric text.
    ///
    /// # Examples
    /// ```
    /// # use sizer_domain::FieldValue;
    /// assert_eq!(FieldValue::new(" 12.5 ").as_number(), 12.5);
    /// assert!(FieldValue::new("").as_number().is_nan());
    /// assert!(FieldValue::new("abc").as_number().is_nan());
    /// ```
    pub fn as_number(&self) -> f64 {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return f64::NAN;
        }
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldValue {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for FieldValue {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

// =============================================================================
// Trend
// =============================================================================

/// Direction implied by the entry and stop-loss prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    /// Stop below entry
    Bullish,
    /// Stop at or above entry
    Bearish,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "Bullish"),
            Trend::Bearish => write!(f, "Bearish"),
        }
    }
}

// =============================================================================
// DerivedValue
// =============================================================================

/// Output of a formula node.
///
/// Numbers may be NaN or infinite; that is how malformed input surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DerivedValue {
    /// Numeric result
    Number(f64),
    /// Trend label
    Trend(Trend),
    /// Not computable from the current inputs
    #[default]
    Undefined,
}

impl DerivedValue {
    /// Numeric view: NaN for anything that is not a number
    pub fn as_number(&self) -> f64 {
        match self {
            DerivedValue::Number(value) => *value,
            _ => f64::NAN,
        }
    }

    /// Trend view
    pub fn as_trend(&self) -> Option<Trend> {
        match self {
            DerivedValue::Trend(trend) => Some(*trend),
            _ => None,
        }
    }

    /// True for `Undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, DerivedValue::Undefined)
    }
}

impl From<f64> for DerivedValue {
    fn from(value: f64) -> Self {
        DerivedValue::Number(value)
    }
}

impl From<Option<Trend>> for DerivedValue {
    fn from(trend: Option<Trend>) -> Self {
        trend.map_or(DerivedValue::Undefined, DerivedValue::Trend)
    }
}

// =============================================================================
// Tests
// =============================================================================
