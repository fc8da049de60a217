//! Output composition.
//!
//! Maps the resolver outcome to the value consumers display. An
//! unresolved set shows the blank sentinel, never the default condition's
//! output and never a zero/empty stand-in; a set starved by a broken
//! subscription shows a distinct unavailable marker so an operator can
//! tell "no data yet" apart from "source broken".

use serde::{Deserialize, Serialize};

use super::definition::ConditionSetDefinition;
use super::resolver::Resolution;

/// Rendered form of the blank sentinel.
pub const BLANK_OUTPUT: &str = "---";

/// Value a condition set currently reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputValue {
    /// No condition could be conclusively resolved.
    Blank,
    /// A referenced subscription failed; evaluation cannot settle.
    Unavailable,
    /// Output of the active condition.
    Value(String),
}

impl std::fmt::Display for OutputValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "{BLANK_OUTPUT}"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

/// Resolved state pushed to consumers on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputState {
    pub value: OutputValue,
    pub active_condition: Option<String>,
}

impl OutputState {
    pub fn blank() -> Self {
        Self {
            value: OutputValue::Blank,
            active_condition: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            value: OutputValue::Unavailable,
            active_condition: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.value == OutputValue::Blank
    }
}

impl Default for OutputState {
    fn default() -> Self {
        Self::blank()
    }
}

/// Compose the reported output from a resolution.
///
/// `subscription_failed` marks that at least one referenced feed could
/// not be established. A condition that still resolves true wins over
/// that; only an otherwise-unresolved set reports unavailable.
pub fn compose(
    definition: &ConditionSetDefinition,
    resolution: Resolution,
    subscription_failed: bool,
    retain_on_indeterminate: bool,
    previous: &OutputState,
) -> OutputState {
    match resolution {
        Resolution::Active(index) => {
            let condition = &definition.conditions[index];
            OutputState {
                value: OutputValue::Value(condition.output.clone()),
                active_condition: Some(condition.id.clone()),
            }
        }
        Resolution::Indeterminate => {
            if subscription_failed {
                OutputState::unavailable()
            } else if retain_on_indeterminate && previous.active_condition.is_some() {
                previous.clone()
            } else {
                OutputState::blank()
            }
        }
    }
}
