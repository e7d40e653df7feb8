//! Outbound notifications.
//!
//! Every externally observable session change is forwarded as one
//! [`Notification`] through a tokio [`mpsc`] channel handed to the manager
//! at construction. The channel is shared read-only across all sessions; a
//! closed or failing receiver is logged and ignored so notification
//! delivery can never abort a reader loop or a session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::event::{CliEvent, EventContent, EventRole, EventType};
use crate::models::session::{ExecutionState, PendingQuestion, SessionSummary};

/// One outbound notification, tagged with its wire name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A session transitioned to a new lifecycle state.
    ExecutionStateChange {
        /// Session identifier.
        execution_id: String,
        /// The new state.
        state: ExecutionState,
        /// Full snapshot at transition time.
        execution: SessionSummary,
    },
    /// One classified event was appended to a session's history.
    CliEvent {
        /// Session identifier.
        execution_id: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
        /// Event classification.
        event_type: EventType,
        /// Event origin.
        role: EventRole,
        /// Event payload.
        content: EventContent,
    },
    /// The agent invoked the structured "ask the user" tool.
    StructuredQuestionDetected {
        /// Session identifier.
        execution_id: String,
        /// Raw question entries from the tool input.
        questions: Vec<Value>,
    },
    /// The implicit question heuristic fired.
    QuestionDetected {
        /// Session identifier.
        execution_id: String,
        /// The detected blocking question.
        question: PendingQuestion,
    },
}

impl Notification {
    /// Build an `execution_state_change` notification from a snapshot.
    #[must_use]
    pub fn state_change(execution: SessionSummary) -> Self {
        Self::ExecutionStateChange {
            execution_id: execution.id.clone(),
            state: execution.state,
            execution,
        }
    }

    /// Build a `cli_event` notification from an appended event.
    #[must_use]
    pub fn cli_event(execution_id: &str, event: &CliEvent) -> Self {
        Self::CliEvent {
            execution_id: execution_id.to_owned(),
            timestamp: event.timestamp,
            event_type: event.event_type,
            role: event.role,
            content: event.content.clone(),
        }
    }
}

/// Shared notification sink. Cloned into every reader task.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Notification>>,
}

impl Notifier {
    /// Sink forwarding into the given channel.
    #[must_use]
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that drops every notification (no observer attached).
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Forward a notification, ignoring a closed or failing receiver.
    pub async fn emit(&self, notification: Notification) {
        let Some(tx) = &self.tx else { return };
        if tx.send(notification).await.is_err() {
            debug!("notification receiver closed, dropping notification");
        }
    }
}
