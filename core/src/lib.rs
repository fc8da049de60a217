pub mod conditions;
pub mod notify;
pub mod service;
pub mod telemetry;

// Re-exports for convenience
pub use conditions::{
    BLANK_OUTPUT, Condition, ConditionSetDefinition, ConditionSetEngine, Criterion,
    CriterionPatch, EngineEvent, EngineOptions, OutputState, OutputValue, Truth,
};
pub use notify::{Notification, NotificationQueue, Severity};
pub use service::{ConditionMonitor, ServiceCommand, ServiceHandle};
pub use telemetry::{TelemetryCache, TelemetryKey, TelemetryPoint, TelemetrySample};
pub use vigil_types::{Combination, Operator, TelemetryValue};
