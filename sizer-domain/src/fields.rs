//! Field Registry
//!
//! Static definitions of every user-editable trade parameter.
//! The registry is fixed at compile time; each field's `name` doubles as its
//! persistence key.

use crate::value_objects::{DomainError, FieldValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix appended to a field name to form its lock persistence key.
pub const LOCK_KEY_SUFFIX: &str = ".lock";

// =============================================================================
// FieldId
// =============================================================================

/// Identifier of a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldId {
    /// Account balance in USD
    AccountBalance,
    /// Percentage of the balance put at risk
    RiskPercent,
    /// Entry price in USD
    EntryPrice,
    /// Exchange fee on entry (%)
    EntryFee,
    /// Stop-loss price in USD
    Stoploss,
    /// Exchange fee when the stop fills (%)
    StopFee,
    /// Take-profit price in USD
    TakeProfit,
    /// Exchange fee when the take-profit fills (%)
    TakeProfitFee,
}

impl FieldId {
    /// All fields in display order.
    pub const ALL: [FieldId; 8] = [
        FieldId::AccountBalance,
        FieldId::RiskPercent,
        FieldId::EntryPrice,
        FieldId::EntryFee,
        FieldId::Stoploss,
        FieldId::StopFee,
        FieldId::TakeProfit,
        FieldId::TakeProfitFee,
    ];

    /// Get the static definition of this field
    pub fn spec(self) -> &'static FieldSpec {
        // FIELDS is laid out in the same order as the enum discriminants
        &FIELDS[self as usize]
    }

    /// Get the field name (also its persistence key)
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Look up a field by name
    ///
    /// # Errors
    /// Returns `DomainError::UnknownField` if no field has that name
    pub fn from_name(name: &str) -> Result<Self, DomainError> {
        FIELDS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.id)
            .ok_or_else(|| DomainError::UnknownField(name.to_string()))
    }

    /// Whether this field carries a lock flag
    pub fn is_lockable(self) -> bool {
        self.spec().lockable
    }

    /// Key under which the field value is persisted
    pub fn value_key(self) -> &'static str {
        self.name()
    }

    /// Key under which the lock flag is persisted (`None` if not lockable)
    pub fn lock_key(self) -> Option<String> {
        self.is_lockable().then(|| format!("{}{}", self.name(), LOCK_KEY_SUFFIX))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

// =============================================================================
// FieldSpec
// =============================================================================

/// Input type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Numeric input (edited as text)
    Number,
    /// Free text input
    Text,
}

/// Immutable definition of a field.
///
/// `min`, `max` and `step` are hints for the presentation layer and are never
/// enforced by the core. Neither is `required`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Field identifier
    pub id: FieldId,
    /// Unique name, also the persistence key
    pub name: &'static str,
    /// Display label
    pub title: &'static str,
    /// Input type
    pub kind: FieldKind,
    /// Value used at first start and after a reset
    pub default_value: Option<&'static str>,
    /// Lower bound hint
    pub min: Option<f64>,
    /// Upper bound hint
    pub max: Option<f64>,
    /// Step hint
    pub step: Option<f64>,
    /// Presentation hint
    pub required: bool,
    /// Whether a lock flag exists for this field
    pub lockable: bool,
}

impl FieldSpec {
    /// Value the field takes after a reset (empty when there is no default)
    pub fn default_field_value(&self) -> FieldValue {
        self.default_value.map(FieldValue::new).unwrap_or_default()
    }
}

static FIELDS: [FieldSpec; 8] = [
    FieldSpec {
        id: FieldId::AccountBalance,
        name: "account-balance",
        title: "Account Balance USD:",
        kind: FieldKind::Number,
        default_value: Some("1000"),
        min: None,
        max: None,
        step: None,
        required: true,
        lockable: false,
    },
    FieldSpec {
        id: FieldId::RiskPercent,
        name: "risk-percent",
        title: "Risk (%) :",
        kind: FieldKind::Number,
        default_value: Some("2"),
        min: Some(0.0),
        max: Some(100.0),
        step: Some(0.01),
        required: true,
        lockable: true,
    },
    FieldSpec {
        id: FieldId::EntryPrice,
        name: "entry-price",
        title: "Entry Price (USD):",
        kind: FieldKind::Number,
        default_value: None,
        min: None,
        max: None,
        step: None,
        required: true,
        lockable: false,
    },
    FieldSpec {
        id: FieldId::EntryFee,
        name: "entry-fee",
        title: "Entry Fee (%):",
        kind: FieldKind::Number,
        default_value: Some("1"),
        min: Some(0.0),
        max: Some(100.0),
        step: None,
        required: false,
        lockable: true,
    },
    FieldSpec {
        id: FieldId::Stoploss,
        name: "stoploss",
        title: "Stoploss (USD):",
        kind: FieldKind::Number,
        default_value: None,
        min: None,
        max: None,
        step: None,
        required: false,
        lockable: false,
    },
    FieldSpec {
        id: FieldId::StopFee,
        name: "stop-fee",
        title: "Stop Fee %:",
        kind: FieldKind::Number,
        default_value: Some("1"),
        min: Some(0.0),
        max: Some(100.0),
        step: None,
        required: false,
        lockable: true,
    },
    FieldSpec {
        id: FieldId::TakeProfit,
        name: "take-profit",
        title: "Take Profit (USD):",
        kind: FieldKind::Number,
        default_value: None,
        min: None,
        max: None,
        step: None,
        required: false,
        lockable: false,
    },
    FieldSpec {
        id: FieldId::TakeProfitFee,
        name: "take-profit-fee",
        title: "Take Profit Fee %:",
        kind: FieldKind::Number,
        default_value: Some("1"),
        min: Some(0.0),
        max: Some(100.0),
        step: None,
        required: false,
        lockable: true,
    },
];

/// All field definitions in display order
pub fn registry() -> &'static [FieldSpec] {
    &FIELDS
}

// =============================================================================
// Tests
// =============================================================================
