//! Telemetry intake: stream identity, latest-value cache, and the
//! subscription boundary to the external telemetry layer.

pub mod cache;
pub mod provider;

pub use cache::{TelemetryCache, TelemetryPoint};
pub use provider::{NullProvider, Subscription, SubscriptionError, TelemetryProvider};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use vigil_types::TelemetryValue;

/// Identity of one telemetry stream: a source object plus one of its fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TelemetryKey {
    pub source: String,
    pub field: String,
}

impl TelemetryKey {
    pub fn new(source: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            field: field.into(),
        }
    }
}

impl std::fmt::Display for TelemetryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.source, self.field)
    }
}

/// One inbound sample as pushed by the telemetry layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub source: String,
    pub field: String,
    pub value: TelemetryValue,
    pub timestamp: NaiveDateTime,
    /// Sources may flag individual samples as bad; those evaluate as
    /// missing data, not as their carried value.
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl TelemetrySample {
    pub fn new(
        source: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<TelemetryValue>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            source: source.into(),
            field: field.into(),
            value: value.into(),
            timestamp,
            valid: true,
        }
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn key(&self) -> TelemetryKey {
        TelemetryKey::new(self.source.clone(), self.field.clone())
    }
}
