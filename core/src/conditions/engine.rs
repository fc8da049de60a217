//! Live condition set engine.
//!
//! Owns the runtime state of one condition set: the definition snapshot,
//! the telemetry cache, and the subscriptions backing every referenced
//! stream. Evaluation is driven by sample arrival; edits swap the
//! definition atomically so a resolver walk never observes a half-applied
//! change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use super::definition::{
    Condition, ConditionSetDefinition, Criterion, CriterionPatch, DefinitionError,
};
use super::output::{self, OutputState};
use super::resolver;
use crate::telemetry::{
    Subscription, SubscriptionError, TelemetryCache, TelemetryKey, TelemetryProvider,
    TelemetrySample,
};

/// Tuning knobs for one engine instance.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// When a higher-priority condition goes indeterminate, keep the
    /// previously active output instead of blanking.
    pub retain_output_on_indeterminate: bool,
}

/// Events produced by evaluation and edits, drained by the caller after
/// each operation.
#[derive(Debug)]
pub enum EngineEvent {
    /// The resolved output changed, including transitions into/out of
    /// blank and unavailable.
    OutputChanged(OutputState),
    /// A criterion or expression is misconfigured. Reported once per
    /// subject until it is edited.
    ConfigurationWarning { subject_id: String, message: String },
    /// The telemetry layer could not establish a feed.
    SubscriptionFailed {
        key: TelemetryKey,
        error: SubscriptionError,
    },
}

/// Rejected edit operations.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("unknown condition '{0}'")]
    UnknownCondition(String),
    #[error("unknown criterion '{0}'")]
    UnknownCriterion(String),
    #[error("the default condition cannot be removed")]
    RemoveDefault,
    #[error("reorder list must name every condition exactly once")]
    BadOrder,
}

/// Single-writer evaluation engine for one condition set.
///
/// All mutation goes through `&mut self`; the service layer serializes
/// samples and edits through one task so concurrent updates for the same
/// set are processed strictly in arrival order. Dropping the engine drops
/// every subscription handle, which releases the feeds.
pub struct ConditionSetEngine {
    definition: Arc<ConditionSetDefinition>,
    options: EngineOptions,
    provider: Arc<dyn TelemetryProvider>,
    cache: TelemetryCache,
    subscriptions: HashMap<TelemetryKey, Subscription>,
    failed: HashSet<TelemetryKey>,
    /// Subjects whose configuration warning has already been reported.
    warned: HashSet<String>,
    output: OutputState,
    events: Vec<EngineEvent>,
}

impl ConditionSetEngine {
    /// Validate the definition, establish subscriptions, and run the
    /// initial evaluation tick. A set holding only its default condition
    /// starts with the default active; one with pending criteria starts
    /// blank.
    pub fn new(
        definition: ConditionSetDefinition,
        provider: Arc<dyn TelemetryProvider>,
        options: EngineOptions,
    ) -> Result<Self, DefinitionError> {
        definition.validate()?;
        tracing::info!(set = %definition.id, conditions = definition.conditions.len(), "starting condition set engine");

        let mut engine = Self {
            definition: Arc::new(definition),
            options,
            provider,
            cache: TelemetryCache::new(),
            subscriptions: HashMap::new(),
            failed: HashSet::new(),
            warned: HashSet::new(),
            output: OutputState::blank(),
            events: Vec::new(),
        };
        engine.sync_subscriptions();
        engine.reevaluate();
        Ok(engine)
    }

    pub fn definition(&self) -> &ConditionSetDefinition {
        &self.definition
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Latest resolved output. Never torn: composed in full on each tick.
    pub fn current_output(&self) -> &OutputState {
        &self.output
    }

    /// Drain events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Keys this engine currently holds live subscriptions for.
    pub fn subscribed_keys(&self) -> impl Iterator<Item = &TelemetryKey> {
        self.subscriptions.keys()
    }

    // ─── Telemetry intake ────────────────────────────────────────────────────

    /// Ingest one sample. Caches it unconditionally; triggers an
    /// evaluation tick only when some criterion references the stream.
    pub fn handle_sample(&mut self, sample: TelemetrySample) {
        let key = sample.key();
        let referenced =
            self.subscriptions.contains_key(&key) || self.failed.contains(&key);
        self.cache.apply(&sample);
        if referenced {
            self.reevaluate();
        } else {
            tracing::debug!(%key, "sample for unreferenced stream cached without evaluation");
        }
    }

    // ─── Live editing ────────────────────────────────────────────────────────

    /// Append a condition just above the default.
    pub fn add_condition(&mut self, condition: Condition) -> Result<(), EditError> {
        self.edit(|def| {
            let at = def.default_index().unwrap_or(def.conditions.len());
            def.conditions.insert(at, condition);
            Ok(())
        })
    }

    pub fn remove_condition(&mut self, condition_id: &str) -> Result<(), EditError> {
        self.edit(|def| {
            let Some(index) = def.conditions.iter().position(|c| c.id == condition_id) else {
                return Err(EditError::UnknownCondition(condition_id.to_string()));
            };
            if def.conditions[index].is_default {
                return Err(EditError::RemoveDefault);
            }
            def.conditions.remove(index);
            Ok(())
        })
    }

    /// Replace the priority order. `order` must name every condition
    /// exactly once; the structural check keeps the default last.
    pub fn reorder_conditions(&mut self, order: &[String]) -> Result<(), EditError> {
        self.edit(|def| {
            let mut remaining = std::mem::take(&mut def.conditions);
            let mut reordered = Vec::with_capacity(order.len());
            for id in order {
                let Some(index) = remaining.iter().position(|c| c.id == *id) else {
                    return Err(EditError::BadOrder);
                };
                reordered.push(remaining.remove(index));
            }
            if !remaining.is_empty() {
                return Err(EditError::BadOrder);
            }
            def.conditions = reordered;
            Ok(())
        })
    }

    pub fn add_criterion(
        &mut self,
        condition_id: &str,
        criterion: Criterion,
    ) -> Result<(), EditError> {
        self.edit(|def| {
            let Some(condition) = def.condition_mut(condition_id) else {
                return Err(EditError::UnknownCondition(condition_id.to_string()));
            };
            condition.criteria.push(criterion);
            Ok(())
        })
    }

    pub fn update_criterion(
        &mut self,
        criterion_id: &str,
        patch: &CriterionPatch,
    ) -> Result<(), EditError> {
        let result = self.edit(|def| {
            let found = def
                .conditions
                .iter_mut()
                .flat_map(|c| c.criteria.iter_mut())
                .find(|c| c.id == criterion_id);
            let Some(criterion) = found else {
                return Err(EditError::UnknownCriterion(criterion_id.to_string()));
            };
            patch.apply_to(criterion);
            Ok(())
        });
        if result.is_ok() {
            // An edited criterion may be fixed now; let its warning fire
            // again if it is still broken.
            self.warned.remove(criterion_id);
        }
        result
    }

    /// Remove a criterion. If it held the last reference to a stream the
    /// subscription is released immediately and no later delivery for
    /// that stream is consulted.
    pub fn remove_criterion(&mut self, criterion_id: &str) -> Result<(), EditError> {
        self.edit(|def| {
            for condition in def.conditions.iter_mut() {
                if let Some(index) = condition.criteria.iter().position(|c| c.id == criterion_id) {
                    condition.criteria.remove(index);
                    return Ok(());
                }
            }
            Err(EditError::UnknownCriterion(criterion_id.to_string()))
        })
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), EditError> {
        let name = name.into();
        self.edit(move |def| {
            def.name = name;
            Ok(())
        })
    }

    /// Apply one mutation as a copy-on-write snapshot swap: the live
    /// definition is either the old one in full or the new one in full.
    fn edit<F>(&mut self, mutate: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut ConditionSetDefinition) -> Result<(), EditError>,
    {
        let mut next = (*self.definition).clone();
        mutate(&mut next)?;
        next.validate()?;

        self.definition = Arc::new(next);

        // A removed active condition clears the selection before the
        // forced re-evaluation below reports anything.
        if let Some(active) = &self.output.active_condition {
            if self.definition.condition(active).is_none() {
                self.output.active_condition = None;
            }
        }

        self.sync_subscriptions();
        self.reevaluate();
        Ok(())
    }

    // ─── Evaluation ──────────────────────────────────────────────────────────

    fn reevaluate(&mut self) {
        let report = resolver::resolve(&self.definition, &self.cache);

        for warning in report.warnings {
            if self.warned.insert(warning.subject_id.clone()) {
                tracing::warn!(
                    subject = %warning.subject_id,
                    "degraded to indeterminate: {}",
                    warning.message
                );
                self.events.push(EngineEvent::ConfigurationWarning {
                    subject_id: warning.subject_id,
                    message: warning.message,
                });
            }
        }

        let next = output::compose(
            &self.definition,
            report.resolution,
            !self.failed.is_empty(),
            self.options.retain_output_on_indeterminate,
            &self.output,
        );
        if next != self.output {
            tracing::debug!(set = %self.definition.id, value = %next.value, "output changed");
            self.output = next.clone();
            self.events.push(EngineEvent::OutputChanged(next));
        }
    }

    /// Bring held subscriptions in line with the streams the current
    /// definition references: release stale handles (marking their cached
    /// points stale), then acquire missing ones. Failed keys are retried
    /// on the next sync and reported only on transition into failure.
    fn sync_subscriptions(&mut self) {
        let wanted = self.definition.referenced_keys();

        let released: Vec<TelemetryKey> = self
            .subscriptions
            .keys()
            .filter(|key| !wanted.contains(*key))
            .cloned()
            .collect();
        for key in released {
            self.subscriptions.remove(&key);
            self.cache.mark_stale(&key);
            tracing::debug!(%key, "released telemetry subscription");
        }
        self.failed.retain(|key| wanted.contains(key));

        for key in wanted {
            if self.subscriptions.contains_key(&key) {
                continue;
            }
            match self.provider.subscribe(&key) {
                Ok(subscription) => {
                    self.failed.remove(&key);
                    self.subscriptions.insert(key, subscription);
                }
                Err(error) => {
                    if self.failed.insert(key.clone()) {
                        tracing::warn!(%key, %error, "telemetry subscription failed");
                        self.events.push(EngineEvent::SubscriptionFailed { key, error });
                    }
                }
            }
        }
    }
}

impl Drop for ConditionSetEngine {
    fn drop(&mut self) {
        // Subscription handles unsubscribe on drop; this is just the
        // lifecycle breadcrumb.
        tracing::info!(set = %self.definition.id, "stopping condition set engine");
    }
}
