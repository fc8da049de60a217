//! Comparison operators and criterion combination modes.

use serde::{Deserialize, Serialize};

/// Comparison applied by a single criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    /// Bounds inclusive on both ends.
    Between,
    NotBetween,
    TextContains,
    TextDoesNotContain,
    TextStartsWith,
    TextEndsWith,
    IsDefined,
    IsUndefined,
}

impl Operator {
    /// Ordering and range operators compare numerically only.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
                | Self::Between
                | Self::NotBetween
        )
    }

    /// Text operators require a text operand.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::TextContains | Self::TextDoesNotContain | Self::TextStartsWith | Self::TextEndsWith
        )
    }

    /// Presence checks take no operand at all.
    pub fn needs_operand(&self) -> bool {
        !matches!(self, Self::IsDefined | Self::IsUndefined)
    }

    /// Range operators take a second operand for the upper bound.
    pub fn needs_upper_bound(&self) -> bool {
        matches!(self, Self::Between | Self::NotBetween)
    }

    /// Editor-facing phrasing for this comparison.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EqualTo => "is equal to",
            Self::NotEqualTo => "is not equal to",
            Self::LessThan => "is less than",
            Self::LessThanOrEqualTo => "is less than or equal to",
            Self::GreaterThan => "is greater than",
            Self::GreaterThanOrEqualTo => "is greater than or equal to",
            Self::Between => "is between",
            Self::NotBetween => "is not between",
            Self::TextContains => "contains",
            Self::TextDoesNotContain => "does not contain",
            Self::TextStartsWith => "starts with",
            Self::TextEndsWith => "ends with",
            Self::IsDefined => "is defined",
            Self::IsUndefined => "is undefined",
        }
    }
}

/// How a condition folds its criteria into one result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Combination {
    /// Every criterion must hold.
    #[default]
    All,
    /// At least one criterion must hold.
    Any,
    /// Boolean expression over 1-based criterion positions,
    /// e.g. `"1 and (2 or not 3)"`.
    Custom { expression: String },
}
