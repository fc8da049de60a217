//! Three-valued evaluation results.
//!
//! Criteria and conditions resolve to one of three states so that
//! "definitely not met" stays distinguishable from "unknown because the
//! data has not arrived". Missing data is never silently treated as
//! false or zero.

use serde::{Deserialize, Serialize};

/// Kleene tri-state result of a criterion or condition evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truth {
    True,
    False,
    /// Cannot be evaluated yet. Distinct from `False`.
    Indeterminate,
}

impl Truth {
    pub fn from_bool(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate)
    }

    /// Kleene conjunction: a single hard `False` wins even amid unknowns,
    /// since a definite mismatch is more informative than missing data.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::Indeterminate, _) | (_, Self::Indeterminate) => Self::Indeterminate,
            _ => Self::True,
        }
    }

    /// Kleene disjunction, the dual: `True` dominates, then unknown.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Indeterminate, _) | (_, Self::Indeterminate) => Self::Indeterminate,
            _ => Self::False,
        }
    }

    /// Kleene negation: unknown stays unknown.
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Indeterminate => Self::Indeterminate,
        }
    }

    /// Fold for ALL/AND combinations. Empty input is `True`.
    pub fn all(results: impl IntoIterator<Item = Truth>) -> Self {
        results.into_iter().fold(Self::True, Self::and)
    }

    /// Fold for ANY/OR combinations. Empty input is `False`.
    pub fn any(results: impl IntoIterator<Item = Truth>) -> Self {
        results.into_iter().fold(Self::False, Self::or)
    }
}
