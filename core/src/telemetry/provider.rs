//! Subscription boundary to the external telemetry layer.
//!
//! The engine never talks to the network itself; it asks a
//! [`TelemetryProvider`] for a feed and holds the returned
//! [`Subscription`] for as long as any criterion references the stream.
//! Dropping the handle releases the feed on every exit path, including
//! abnormal teardown.

use thiserror::Error;

use super::TelemetryKey;

/// Raised when the telemetry layer cannot establish a feed. Reported to
/// the view layer as a distinct "unavailable" state, kept apart from
/// "no data yet".
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("unknown telemetry source '{0}'")]
    UnknownSource(String),
    #[error("telemetry layer rejected subscription for {key}: {reason}")]
    Rejected { key: TelemetryKey, reason: String },
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Live feed handle. Unsubscribes when dropped.
pub struct Subscription {
    key: TelemetryKey,
    cancel: Option<CancelFn>,
}

impl Subscription {
    pub fn new(key: TelemetryKey, cancel: CancelFn) -> Self {
        Self {
            key,
            cancel: Some(cancel),
        }
    }

    /// Handle with no teardown work, for providers that deliver through a
    /// shared channel and need no per-stream cleanup.
    pub fn detached(key: TelemetryKey) -> Self {
        Self { key, cancel: None }
    }

    pub fn key(&self) -> &TelemetryKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}

/// External telemetry layer. Setup is fire-and-forget from the engine's
/// perspective; sample delivery is asynchronous push through the service
/// command channel, in per-source arrival order.
pub trait TelemetryProvider: Send + Sync {
    fn subscribe(&self, key: &TelemetryKey) -> Result<Subscription, SubscriptionError>;
}

/// Provider that accepts every subscription and performs no teardown.
/// Used for replay and for fixtures that push samples directly.
#[derive(Debug, Default)]
pub struct NullProvider;

impl TelemetryProvider for NullProvider {
    fn subscribe(&self, key: &TelemetryKey) -> Result<Subscription, SubscriptionError> {
        Ok(Subscription::detached(key.clone()))
    }
}
