//! Tagged model of the agent's stream-json output protocol.
//!
//! Each line of agent stdout is one self-describing JSON record whose
//! `type` field selects the variant. Unknown discriminants (and records
//! that are not objects at all) fall back to [`StreamRecord::Unknown`] so
//! no input is ever lost to a parse failure.

use serde::Deserialize;
use serde_json::Value;

/// One record of the agent's newline-delimited stream output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    /// Complete assistant message with text and/or tool-use blocks.
    Assistant {
        /// Message body.
        #[serde(default)]
        message: AssistantMessage,
    },
    /// Incremental streaming fragment of assistant text.
    ContentBlockDelta {
        /// Delta payload.
        #[serde(default)]
        delta: Delta,
    },
    /// Output returned by a tool to the agent.
    ToolResult {
        /// Either a plain string or a list of sub-blocks with `text` fields.
        #[serde(default)]
        content: Value,
    },
    /// Final record closing an agent turn.
    Result {
        /// Result summary: a string or an object with a `text` field.
        #[serde(default)]
        result: Value,
        /// Cost of the turn.
        #[serde(default)]
        cost_usd: Option<f64>,
        /// Duration of the turn.
        #[serde(default)]
        duration_ms: Option<u64>,
        /// Opaque resume token for continuing the conversation.
        #[serde(default)]
        session_id: Option<String>,
        /// Why the agent stopped (`end_turn` marks a normal end of turn).
        #[serde(default)]
        stop_reason: Option<String>,
    },
    /// System notice from the agent runtime.
    System {
        /// Notice body (free-form).
        #[serde(default)]
        message: Value,
        /// Alternate notice body used by some runtime versions.
        #[serde(default)]
        text: Value,
    },
    /// Fallback for unknown discriminants.
    #[serde(untagged)]
    Unknown(Value),
}

/// Body of an [`StreamRecord::Assistant`] record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    /// Ordered content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One content block inside an assistant message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain-text segment.
    Text {
        /// Segment text.
        #[serde(default)]
        text: String,
    },
    /// Tool invocation segment.
    ToolUse {
        /// Tool name.
        #[serde(default)]
        name: String,
        /// Tool input (arbitrary JSON).
        #[serde(default)]
        input: Value,
    },
    /// Block types this supervisor does not interpret.
    #[serde(untagged)]
    Other(Value),
}

/// Payload of a [`StreamRecord::ContentBlockDelta`] record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    /// Delta kind; only `text_delta` carries text.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Text fragment for `text_delta` deltas.
    #[serde(default)]
    pub text: String,
}
