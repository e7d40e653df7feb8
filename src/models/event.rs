//! Structured event model.
//!
//! One [`CliEvent`] is derived from one line of agent output. Events are
//! immutable once created and only ever appended to a session's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a single line of agent output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Assistant-authored text (complete message or streaming fragment).
    Text,
    /// Assistant message consisting only of tool invocations.
    ToolUse,
    /// Output returned by a tool back to the agent.
    ToolResult,
    /// Final result record closing an agent turn.
    Result,
    /// System notice emitted by the agent runtime.
    SystemSummary,
    /// Line read from the diagnostic (stderr) channel.
    Stderr,
    /// Line that failed to parse as a structured record.
    RawText,
    /// Structured record with an unrecognized discriminant.
    Unknown,
}

/// Origin of an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    /// Authored by the agent.
    Assistant,
    /// Produced by the agent runtime or the supervisor itself.
    System,
    /// Relayed human input.
    User,
    /// Produced by a tool execution.
    Tool,
    /// Diagnostic output.
    Error,
}

/// One tool invocation carried inside an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Tool name as reported by the agent.
    pub name: String,
    /// Size-bounded rendering of the tool input.
    pub input: String,
}

/// Typed payload of a [`CliEvent`]. Absent fields are omitted from the
/// serialized form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventContent {
    /// Text body, when the event carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Tool invocations attached to an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolInvocation>>,
    /// Cost reported by a result record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    /// Duration reported by a result record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Opaque resume token reported by a result record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl EventContent {
    /// Payload consisting of a bare text body.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// One normalized record derived from one line of agent output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliEvent {
    /// Wall-clock instant the line was classified.
    pub timestamp: DateTime<Utc>,
    /// Event classification.
    pub event_type: EventType,
    /// Event origin.
    pub role: EventRole,
    /// Structured payload.
    pub content: EventContent,
    /// Original decoded record, when the line parsed as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl CliEvent {
    /// Construct an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, role: EventRole, content: EventContent) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            role,
            content,
            raw: None,
        }
    }

    /// Attach the original decoded record.
    #[must_use]
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }
}
