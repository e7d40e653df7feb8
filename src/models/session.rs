//! Execution session model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Child;
use uuid::Uuid;

use crate::models::event::CliEvent;

/// Lifecycle state for an execution session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Session constructed, agent process not yet running.
    Starting,
    /// Agent process running, readers attached.
    Running,
    /// Agent is blocked on human input.
    AwaitingInput,
    /// Agent process exited with code 0.
    Completed,
    /// Spawn failure, non-zero exit, or runtime failure.
    Failed,
    /// Explicitly stopped by the operator.
    Stopped,
}

impl ExecutionState {
    /// Whether the state is terminal (no further transitions).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::AwaitingInput => "awaiting_input",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Kind of supervised run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Executes an existing workflow definition.
    Execution,
    /// Interactive creation of a new workflow from a stated goal.
    WorkflowCreation,
}

/// A blocking request for human input. At most one exists per session,
/// and only while the session is [`ExecutionState::AwaitingInput`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingQuestion {
    /// Question text shown to the operator.
    pub text: String,
    /// Fixed explanation of how the question was detected.
    pub context: String,
}

/// Aggregate state of one supervised agent run.
///
/// Owned by the session manager; mutated by the stream readers (event
/// appends, accumulator updates, question detection) and by the manager
/// (state transitions). The process handle lives here so exactly one live
/// child exists per session; resuming replaces it wholesale.
#[derive(Debug)]
pub struct ExecutionSession {
    /// Unique identifier, generated at start.
    pub id: String,
    /// Workflow reference or `"workflow-creation"`.
    pub workflow_name: String,
    /// Kind of run.
    pub session_type: SessionType,
    /// Opaque resume token reported by the agent, once known.
    pub agent_session_id: Option<String>,
    /// Current lifecycle state.
    pub state: ExecutionState,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Set exactly when the session reaches a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered append-only event history.
    pub events: Vec<CliEvent>,
    /// Present iff `state == AwaitingInput`.
    pub pending_question: Option<PendingQuestion>,
    /// Live child process, if any.
    pub process: Option<Child>,
    /// Accumulated cost across the run (monotone non-decreasing).
    pub cost_usd: f64,
    /// Accumulated agent-reported duration (monotone non-decreasing).
    pub duration_ms: u64,
    /// Failure description, set when `state == Failed`.
    pub error: Option<String>,
}

impl ExecutionSession {
    /// Construct a new session in [`ExecutionState::Starting`] with a
    /// generated 8-character identifier.
    #[must_use]
    pub fn new(workflow_name: impl Into<String>, session_type: SessionType) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            workflow_name: workflow_name.into(),
            session_type,
            agent_session_id: None,
            state: ExecutionState::Starting,
            started_at: Utc::now(),
            completed_at: None,
            events: Vec::new(),
            pending_question: None,
            process: None,
            cost_usd: 0.0,
            duration_ms: 0,
            error: None,
        }
    }

    /// Record the resume token from a result record.
    ///
    /// A token, once set, is never overwritten by an empty value; only a
    /// new non-empty token replaces it.
    pub fn record_agent_session_id(&mut self, token: Option<&str>) {
        if let Some(token) = token {
            if !token.is_empty() {
                self.agent_session_id = Some(token.to_owned());
            }
        }
    }

    /// Move to a terminal state, stamping `completed_at`.
    pub fn finish(&mut self, state: ExecutionState, error: Option<String>) {
        self.state = state;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    /// Serializable snapshot for observers.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            workflow_name: self.workflow_name.clone(),
            session_type: self.session_type,
            agent_session_id: self.agent_session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            completed_at: self.completed_at,
            event_count: self.events.len(),
            pending_question: self.pending_question.clone(),
            cost_usd: self.cost_usd,
            duration_ms: self.duration_ms,
            error: self.error.clone(),
        }
    }
}

/// Point-in-time snapshot of a session, safe to hand to observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// Workflow reference or `"workflow-creation"`.
    pub workflow_name: String,
    /// Kind of run.
    pub session_type: SessionType,
    /// Opaque resume token, once known.
    pub agent_session_id: Option<String>,
    /// Lifecycle state at snapshot time.
    pub state: ExecutionState,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Terminal timestamp, if reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of events recorded so far.
    pub event_count: usize,
    /// Blocking question, if the session awaits input.
    pub pending_question: Option<PendingQuestion>,
    /// Accumulated cost.
    pub cost_usd: f64,
    /// Accumulated agent-reported duration.
    pub duration_ms: u64,
    /// Failure description, if any.
    pub error: Option<String>,
}
