//! Latest-value store for subscribed telemetry streams.
//!
//! Pure storage: one point per `(source, field)` key, overwritten on every
//! arrival. Evaluation and subscription routing live in the engine.

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use vigil_types::TelemetryValue;

use super::{TelemetryKey, TelemetrySample};

/// Latest sample for one stream.
///
/// `valid` is false when the source flagged the sample bad, or when the
/// stream was unsubscribed after delivery. Staleness is always reported
/// state, never inferred from elapsed time.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    pub value: TelemetryValue,
    pub timestamp: NaiveDateTime,
    pub valid: bool,
}

/// Per-stream latest-value cache. Last write wins by arrival order; the
/// engine accepts out-of-order delivery as-is since each source is
/// single-threaded per subscription.
#[derive(Debug, Clone, Default)]
pub struct TelemetryCache {
    points: HashMap<TelemetryKey, TelemetryPoint>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample, unconditionally replacing any previous point for
    /// its key.
    pub fn apply(&mut self, sample: &TelemetrySample) {
        self.points.insert(
            sample.key(),
            TelemetryPoint {
                value: sample.value.clone(),
                timestamp: sample.timestamp,
                valid: sample.valid,
            },
        );
    }

    pub fn read(&self, key: &TelemetryKey) -> Option<&TelemetryPoint> {
        self.points.get(key)
    }

    /// Flag a stream's point stale after its subscription is released.
    /// The value stays readable but no longer evaluates.
    pub fn mark_stale(&mut self, key: &TelemetryKey) {
        if let Some(point) = self.points.get_mut(key) {
            point.valid = false;
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
