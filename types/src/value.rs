//! Telemetry value representation.
//!
//! Every sample delivered by a telemetry source carries one of these.
//! The untagged serde form lets definition and scenario files write
//! operands as plain TOML/JSON scalars (`0`, `3.5`, `true`, `"high"`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single telemetry datum or criterion operand.
///
/// Variant order matters for untagged deserialization: numbers are tried
/// first, then booleans, then any remaining scalar lands as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl TelemetryValue {
    /// Numeric view of this value.
    ///
    /// Text that parses as a float counts as numeric; booleans do not.
    /// NaN is rejected so comparisons never see it.
    ///
    /// # Examples
    /// ```
    /// use vigil_types::TelemetryValue;
    /// assert_eq!(TelemetryValue::Number(1.5).as_number(), Some(1.5));
    /// assert_eq!(TelemetryValue::Text("42".into()).as_number(), Some(42.0));
    /// assert_eq!(TelemetryValue::Text("nominal".into()).as_number(), None);
    /// assert_eq!(TelemetryValue::Bool(true).as_number(), None);
    /// ```
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Bool(_) => return None,
        };
        (!n.is_nan()).then_some(n)
    }

    /// Boolean view; only genuine booleans qualify.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Display form used for text comparisons and output rendering.
    ///
    /// # Examples
    /// ```
    /// use vigil_types::TelemetryValue;
    /// assert_eq!(TelemetryValue::Number(20.0).as_text(), "20");
    /// assert_eq!(TelemetryValue::Number(0.5).as_text(), "0.5");
    /// ```
    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers print without the trailing ".0" so text
            // comparisons against editor input like "20" line up.
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for TelemetryValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for TelemetryValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for TelemetryValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TelemetryValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        value: TelemetryValue,
    }

    #[test]
    fn test_untagged_toml_forms() {
        let h: Holder = toml::from_str("value = 3.5").unwrap();
        assert_eq!(h.value, TelemetryValue::Number(3.5));

        let h: Holder = toml::from_str("value = 2").unwrap();
        assert_eq!(h.value, TelemetryValue::Number(2.0));

        let h: Holder = toml::from_str("value = true").unwrap();
        assert_eq!(h.value, TelemetryValue::Bool(true));

        let h: Holder = toml::from_str(r#"value = "high""#).unwrap();
        assert_eq!(h.value, TelemetryValue::Text("high".to_string()));
    }

    #[test]
    fn test_numeric_coercion_fails_closed() {
        assert_eq!(TelemetryValue::Text(" 7.25 ".into()).as_number(), Some(7.25));
        assert_eq!(TelemetryValue::Text("7.25x".into()).as_number(), None);
        assert_eq!(TelemetryValue::Number(f64::NAN).as_number(), None);
    }
}
