//! Async facade over the condition set engine.
//!
//! One tokio task owns each engine and drains a command channel, so
//! samples and edits for a set are applied strictly in arrival order
//! (single writer). Resolved output changes publish on a watch channel;
//! engine failures land in a shared notification queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::conditions::{
    Condition, ConditionSetEngine, Criterion, CriterionPatch, EngineEvent, OutputState,
};
use crate::notify::{Notification, NotificationQueue, Severity};
use crate::telemetry::TelemetrySample;

const COMMAND_BUFFER: usize = 64;

/// Commands accepted by a condition set service task.
#[derive(Debug)]
pub enum ServiceCommand {
    Sample(TelemetrySample),
    AddCondition(Condition),
    RemoveCondition(String),
    ReorderConditions(Vec<String>),
    AddCriterion {
        condition_id: String,
        criterion: Criterion,
    },
    UpdateCriterion {
        criterion_id: String,
        patch: CriterionPatch,
    },
    RemoveCriterion(String),
    Rename(String),
    Shutdown,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to communicate with one running condition set task and query
/// its state.
#[derive(Clone)]
pub struct ServiceHandle {
    cmd_tx: mpsc::Sender<ServiceCommand>,
    output_rx: watch::Receiver<OutputState>,
    notifications: Arc<Mutex<NotificationQueue>>,
}

impl ServiceHandle {
    /// Push one telemetry sample into the set's evaluation queue.
    pub async fn sample(&self, sample: TelemetrySample) -> Result<(), String> {
        self.send(ServiceCommand::Sample(sample)).await
    }

    pub async fn add_condition(&self, condition: Condition) -> Result<(), String> {
        self.send(ServiceCommand::AddCondition(condition)).await
    }

    pub async fn remove_condition(&self, condition_id: impl Into<String>) -> Result<(), String> {
        self.send(ServiceCommand::RemoveCondition(condition_id.into()))
            .await
    }

    pub async fn reorder_conditions(&self, order: Vec<String>) -> Result<(), String> {
        self.send(ServiceCommand::ReorderConditions(order)).await
    }

    pub async fn add_criterion(
        &self,
        condition_id: impl Into<String>,
        criterion: Criterion,
    ) -> Result<(), String> {
        self.send(ServiceCommand::AddCriterion {
            condition_id: condition_id.into(),
            criterion,
        })
        .await
    }

    pub async fn update_criterion(
        &self,
        criterion_id: impl Into<String>,
        patch: CriterionPatch,
    ) -> Result<(), String> {
        self.send(ServiceCommand::UpdateCriterion {
            criterion_id: criterion_id.into(),
            patch,
        })
        .await
    }

    pub async fn remove_criterion(&self, criterion_id: impl Into<String>) -> Result<(), String> {
        self.send(ServiceCommand::RemoveCriterion(criterion_id.into()))
            .await
    }

    pub async fn rename(&self, name: impl Into<String>) -> Result<(), String> {
        self.send(ServiceCommand::Rename(name.into())).await
    }

    pub async fn shutdown(&self) -> Result<(), String> {
        self.send(ServiceCommand::Shutdown).await
    }

    async fn send(&self, command: ServiceCommand) -> Result<(), String> {
        self.cmd_tx.send(command).await.map_err(|e| e.to_string())
    }

    /// Latest resolved output.
    pub fn current_output(&self) -> OutputState {
        self.output_rx.borrow().clone()
    }

    /// Receiver that yields on every resolved output change, including
    /// transitions into and out of blank.
    pub fn subscribe_outputs(&self) -> watch::Receiver<OutputState> {
        self.output_rx.clone()
    }

    /// Snapshot of pending notifications in arrival order.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().await.iter().cloned().collect()
    }

    pub async fn dismiss_notification(&self, id: u64) -> bool {
        self.notifications.lock().await.dismiss(id)
    }

    pub async fn dismiss_all_notifications(&self) {
        self.notifications.lock().await.dismiss_all();
    }
}

/// Run one engine on a background task. The returned join handle resolves
/// after `Shutdown` or once every `ServiceHandle` clone is dropped;
/// either way the engine drops with it and releases its subscriptions.
pub fn spawn(mut engine: ConditionSetEngine) -> (ServiceHandle, JoinHandle<()>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ServiceCommand>(COMMAND_BUFFER);
    let (output_tx, output_rx) = watch::channel(engine.current_output().clone());
    let notifications = Arc::new(Mutex::new(NotificationQueue::new()));
    let queue = Arc::clone(&notifications);

    let task = tokio::spawn(async move {
        // Startup may already have produced events (initial resolution,
        // failed subscriptions).
        publish(&mut engine, &output_tx, &queue).await;

        while let Some(command) = cmd_rx.recv().await {
            let stop = matches!(command, ServiceCommand::Shutdown);
            apply(&mut engine, command, &queue).await;
            publish(&mut engine, &output_tx, &queue).await;
            if stop {
                break;
            }
        }
        // Engine drops here; subscription handles release their feeds.
    });

    (
        ServiceHandle {
            cmd_tx,
            output_rx,
            notifications,
        },
        task,
    )
}

async fn apply(
    engine: &mut ConditionSetEngine,
    command: ServiceCommand,
    notifications: &Arc<Mutex<NotificationQueue>>,
) {
    let result = match command {
        ServiceCommand::Sample(sample) => {
            engine.handle_sample(sample);
            Ok(())
        }
        ServiceCommand::AddCondition(condition) => engine.add_condition(condition),
        ServiceCommand::RemoveCondition(id) => engine.remove_condition(&id),
        ServiceCommand::ReorderConditions(order) => engine.reorder_conditions(&order),
        ServiceCommand::AddCriterion {
            condition_id,
            criterion,
        } => engine.add_criterion(&condition_id, criterion),
        ServiceCommand::UpdateCriterion { criterion_id, patch } => {
            engine.update_criterion(&criterion_id, &patch)
        }
        ServiceCommand::RemoveCriterion(id) => engine.remove_criterion(&id),
        ServiceCommand::Rename(name) => engine.rename(name),
        ServiceCommand::Shutdown => Ok(()),
    };

    if let Err(error) = result {
        tracing::warn!(set = %engine.definition().id, %error, "edit rejected");
        notifications
            .lock()
            .await
            .post(Severity::Alert, error.to_string());
    }
}

async fn publish(
    engine: &mut ConditionSetEngine,
    output_tx: &watch::Sender<OutputState>,
    notifications: &Arc<Mutex<NotificationQueue>>,
) {
    for event in engine.take_events() {
        if let EngineEvent::OutputChanged(state) = &event {
            // Send fails only when every receiver is gone; keep running
            // for command-only consumers.
            let _ = output_tx.send(state.clone());
        }
        notifications.lock().await.post_engine_event(&event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Condition Monitor (registry of live sets)
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of running condition set services, keyed by set id.
#[derive(Default)]
pub struct ConditionMonitor {
    sets: HashMap<String, (ServiceHandle, JoinHandle<()>)>,
}

impl ConditionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an engine under management. Replaces (and shuts down) any
    /// previous service registered for the same set id.
    pub async fn create_set(&mut self, engine: ConditionSetEngine) -> ServiceHandle {
        let id = engine.definition().id.clone();
        let (handle, task) = spawn(engine);
        if let Some((old_handle, old_task)) = self.sets.insert(id, (handle.clone(), task)) {
            let _ = old_handle.shutdown().await;
            let _ = old_task.await;
        }
        handle
    }

    /// Stop a set's service and release every telemetry subscription it
    /// held. Returns false for an unknown id.
    pub async fn destroy_set(&mut self, set_id: &str) -> bool {
        let Some((handle, task)) = self.sets.remove(set_id) else {
            return false;
        };
        let _ = handle.shutdown().await;
        let _ = task.await;
        true
    }

    pub fn handle(&self, set_id: &str) -> Option<&ServiceHandle> {
        self.sets.get(set_id).map(|(handle, _)| handle)
    }

    pub fn current_output(&self, set_id: &str) -> Option<OutputState> {
        self.handle(set_id).map(|h| h.current_output())
    }

    pub fn subscribe_outputs(&self, set_id: &str) -> Option<watch::Receiver<OutputState>> {
        self.handle(set_id).map(|h| h.subscribe_outputs())
    }

    pub fn set_ids(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Stop everything, e.g. on application exit.
    pub async fn shutdown_all(&mut self) {
        let ids: Vec<String> = self.sets.keys().cloned().collect();
        for id in ids {
            self.destroy_set(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{
        Condition, ConditionSetDefinition, Criterion, EngineOptions, OutputValue,
    };
    use crate::telemetry::NullProvider;
    use chrono::NaiveDate;
    use vigil_types::{Combination, Operator, TelemetryValue};

    fn ts() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn sine_set() -> ConditionSetDefinition {
        ConditionSetDefinition {
            id: "cs1".to_string(),
            name: "Sine Watch".to_string(),
            conditions: vec![
                Condition {
                    id: "positive".to_string(),
                    name: "Positive".to_string(),
                    criteria: vec![Criterion {
                        id: "crit1".to_string(),
                        source: "gen".to_string(),
                        field: "sine".to_string(),
                        operator: Operator::GreaterThanOrEqualTo,
                        operand: Some(TelemetryValue::Number(0.0)),
                        operand_high: None,
                    }],
                    combination: Combination::All,
                    output: "Positive".to_string(),
                    is_default: false,
                },
                Condition::fallback("dflt", "Default"),
            ],
        }
    }

    fn engine() -> ConditionSetEngine {
        ConditionSetEngine::new(sine_set(), Arc::new(NullProvider), EngineOptions::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_sample_drives_output_through_watch_channel() {
        let (handle, task) = spawn(engine());
        assert!(handle.current_output().is_blank());

        let mut outputs = handle.subscribe_outputs();
        let _ = outputs.borrow_and_update();

        handle
            .sample(TelemetrySample::new("gen", "sine", 0.5, ts()))
            .await
            .unwrap();
        outputs.changed().await.unwrap();
        assert_eq!(
            outputs.borrow_and_update().value,
            OutputValue::Value("Positive".to_string())
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_edit_posts_notification() {
        let (handle, task) = spawn(engine());

        handle.remove_condition("dflt").await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let pending = handle.notifications().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].severity, Severity::Alert);
    }

    #[tokio::test]
    async fn test_monitor_create_query_destroy() {
        let mut monitor = ConditionMonitor::new();
        let handle = monitor.create_set(engine()).await;

        handle
            .sample(TelemetrySample::new("gen", "sine", 1.0, ts()))
            .await
            .unwrap();
        handle.shutdown().await.unwrap();

        assert!(monitor.current_output("cs1").is_some());
        assert!(monitor.current_output("unknown").is_none());

        assert!(monitor.destroy_set("cs1").await);
        assert!(!monitor.destroy_set("cs1").await);
        assert!(monitor.current_output("cs1").is_none());
    }
}
