//! Condition set evaluation engine.
//!
//! This module provides:
//! - **Definitions**: The editable, persisted shape of a condition set
//! - **Evaluation**: Tri-state criterion/condition resolution over live telemetry
//! - **Engine**: Runtime state, subscriptions, and live editing for one set
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                  Definition (TOML/JSON config)                    │
//! │  "While battery.charge < 20, report LOW; otherwise report OK"    │
//! └──────────────────────────────────────────────────────────────────┘
//!                               │
//!                      TelemetrySample arrives
//!                               │
//!                               ▼
//!       Telemetry Value Cache ──► Criterion Evaluator (per criterion)
//!                               │
//!                               ▼
//!            Condition Evaluator (ALL / ANY / custom, Kleene)
//!                               │
//!                               ▼
//!          Condition Set Resolver (first-match priority walk)
//!                               │
//!                               ▼
//!            Output Composer ──► OutputState for consumers
//! ```

mod criterion;
mod definition;
mod engine;
mod expression;
mod output;
mod resolver;
mod store;
mod truth;

#[cfg(test)]
mod engine_tests;

pub use criterion::CriterionOutcome;
pub use definition::{
    Condition, ConditionSetDefinition, Criterion, CriterionPatch, DefinitionConfig,
    DefinitionError,
};
pub use engine::{ConditionSetEngine, EditError, EngineEvent, EngineOptions};
pub use expression::{Expression, ExpressionError};
pub use output::{BLANK_OUTPUT, OutputState, OutputValue};
pub use resolver::{CriterionWarning, Resolution, ResolveReport};
pub use store::{
    ConfigError, default_definitions_dir, load_config, load_set_json, save_config, save_set_json,
};
pub use truth::Truth;
