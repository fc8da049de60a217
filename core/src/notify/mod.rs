//! Notification surfacing for engine failures.
//!
//! The engine never renders anything; it posts plain notification records
//! into a FIFO queue that a banner/overlay layer consumes and dismisses.
//! Configuration warnings arrive as alerts, subscription failures as
//! errors.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::conditions::EngineEvent;

/// Notification severity, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Alert,
    Error,
}

/// One pending notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    pub raised_at: NaiveDateTime,
}

/// FIFO of pending notifications. Dismissal is individual or wholesale;
/// an empty queue means the overlay has nothing to show and closes.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    next_id: u64,
    items: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification, returning its id for later dismissal.
    pub fn post(&mut self, severity: Severity, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push_back(Notification {
            id,
            severity,
            message: message.into(),
            raised_at: chrono::Local::now().naive_local(),
        });
        id
    }

    /// Post the notification an engine event warrants, if any.
    pub fn post_engine_event(&mut self, event: &EngineEvent) -> Option<u64> {
        match event {
            EngineEvent::ConfigurationWarning { subject_id, message } => {
                Some(self.post(Severity::Alert, format!("{subject_id}: {message}")))
            }
            EngineEvent::SubscriptionFailed { key, error } => {
                Some(self.post(Severity::Error, format!("{key}: {error}")))
            }
            EngineEvent::OutputChanged(_) => None,
        }
    }

    /// Dismiss one notification by id. Returns false if it was already
    /// gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn dismiss_all(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pending notifications in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    /// Most severe pending severity, for banner styling.
    pub fn highest_severity(&self) -> Option<Severity> {
        self.items.iter().map(|n| n.severity).max()
    }
}
