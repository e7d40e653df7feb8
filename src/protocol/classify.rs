//! Event classifier.
//!
//! Pure functions mapping one decoded line of agent output to one
//! [`CliEvent`] plus classifier-local signals (structured questions, result
//! metadata) that the session manager consumes. Classification never
//! mutates session state and never drops input: lines that fail to parse
//! degrade to `raw_text`, unknown discriminants degrade to `unknown`.

use serde_json::Value;

use crate::models::event::{CliEvent, EventContent, EventRole, EventType, ToolInvocation};
use crate::protocol::record::{ContentBlock, StreamRecord};

/// Size bound for the per-tool input rendering.
pub const TOOL_INPUT_LIMIT: usize = 200;
/// Size bound for tool-result and result summaries.
pub const RESULT_TEXT_LIMIT: usize = 500;
/// Size bound for the rendering of an unknown record.
pub const UNKNOWN_RECORD_LIMIT: usize = 300;

/// Name of the dedicated "ask the user" tool.
pub const ASK_USER_TOOL: &str = "AskUserQuestion";
/// Stop reason marking a normal end of turn.
pub const STOP_REASON_END_TURN: &str = "end_turn";

/// Metadata extracted from a `result` record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMeta {
    /// Opaque resume token, if reported.
    pub session_id: Option<String>,
    /// Cost of the turn, if reported.
    pub cost_usd: Option<f64>,
    /// Duration of the turn, if reported.
    pub duration_ms: Option<u64>,
    /// Stop reason, if reported.
    pub stop_reason: Option<String>,
}

/// Output of classifying one line: exactly one event plus side signals.
#[derive(Debug, Clone)]
pub struct Classified {
    /// The normalized event to append and forward.
    pub event: CliEvent,
    /// Questions array of an `AskUserQuestion` invocation, when present.
    pub ask_user: Option<Vec<Value>>,
    /// Metadata of a `result` record, when present.
    pub result_meta: Option<ResultMeta>,
}

impl Classified {
    fn event_only(event: CliEvent) -> Self {
        Self {
            event,
            ask_user: None,
            result_meta: None,
        }
    }
}

/// Classify one decoded line of primary-channel output.
///
/// Lines that do not parse as JSON become `raw_text` events; everything
/// else is routed through [`classify_record`].
#[must_use]
pub fn classify_line(line: &str) -> Classified {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => classify_record(value),
        Err(_) => Classified::event_only(CliEvent::new(
            EventType::RawText,
            EventRole::System,
            EventContent::text(line),
        )),
    }
}

/// Classify one parsed JSON record.
#[must_use]
pub fn classify_record(raw: Value) -> Classified {
    let record = match serde_json::from_value::<StreamRecord>(raw.clone()) {
        Ok(record) => record,
        Err(_) => StreamRecord::Unknown(raw.clone()),
    };

    match record {
        StreamRecord::Assistant { message } => classify_assistant(&message.content, raw),
        StreamRecord::ContentBlockDelta { delta } => {
            let text = if delta.kind == "text_delta" {
                delta.text
            } else {
                String::new()
            };
            Classified::event_only(
                CliEvent::new(EventType::Text, EventRole::Assistant, EventContent::text(text))
                    .with_raw(raw),
            )
        }
        StreamRecord::ToolResult { content } => Classified::event_only(
            CliEvent::new(
                EventType::ToolResult,
                EventRole::Tool,
                EventContent::text(truncate(&render_tool_result(&content), RESULT_TEXT_LIMIT)),
            )
            .with_raw(raw),
        ),
        StreamRecord::Result {
            result,
            cost_usd,
            duration_ms,
            session_id,
            stop_reason,
        } => {
            let content = EventContent {
                text: Some(truncate(&render_result(&result), RESULT_TEXT_LIMIT)),
                tools: None,
                cost_usd,
                duration_ms,
                session_id: session_id.clone(),
            };
            Classified {
                event: CliEvent::new(EventType::Result, EventRole::System, content).with_raw(raw),
                ask_user: None,
                result_meta: Some(ResultMeta {
                    session_id,
                    cost_usd,
                    duration_ms,
                    stop_reason,
                }),
            }
        }
        StreamRecord::System { message, text } => Classified::event_only(
            CliEvent::new(
                EventType::SystemSummary,
                EventRole::System,
                EventContent::text(render_notice(&message, &text)),
            )
            .with_raw(raw),
        ),
        StreamRecord::Unknown(value) => Classified::event_only(
            CliEvent::new(
                EventType::Unknown,
                EventRole::System,
                EventContent::text(truncate(&value.to_string(), UNKNOWN_RECORD_LIMIT)),
            )
            .with_raw(raw),
        ),
    }
}

/// Whether assistant text, trailing whitespace trimmed, ends with a
/// question mark.
///
/// This is the implicit question heuristic: deliberately broad (any
/// sentence ending in `?` counts), kept behind this predicate so it can be
/// replaced without touching the state machine.
#[must_use]
pub fn ends_with_question_mark(text: &str) -> bool {
    text.trim_end().ends_with('?')
}

/// Cut `text` to `limit` characters, replacing the tail with `...` when it
/// exceeds the bound. Strings at or under the bound pass through unchanged.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(limit - 3).collect();
    out.push_str("...");
    out
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Classify an assistant record: tool-only messages become `tool_use`
/// events, everything else a `text` event with the tool list attached.
fn classify_assistant(blocks: &[ContentBlock], raw: Value) -> Classified {
    let mut texts: Vec<&str> = Vec::new();
    let mut tools: Vec<ToolInvocation> = Vec::new();
    let mut ask_user: Option<Vec<Value>> = None;

    for block in blocks {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::ToolUse { name, input } => {
                tools.push(ToolInvocation {
                    name: name.clone(),
                    input: truncate(&input.to_string(), TOOL_INPUT_LIMIT),
                });
                if name == ASK_USER_TOOL && input.is_object() && ask_user.is_none() {
                    let questions = input
                        .get("questions")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    ask_user = Some(questions);
                }
            }
            ContentBlock::Other(_) => {}
        }
    }

    let event = if !tools.is_empty() && texts.is_empty() {
        let content = EventContent {
            tools: Some(tools),
            ..EventContent::default()
        };
        CliEvent::new(EventType::ToolUse, EventRole::Assistant, content).with_raw(raw)
    } else {
        let content = EventContent {
            text: Some(texts.join("\n")),
            tools: (!tools.is_empty()).then_some(tools),
            ..EventContent::default()
        };
        CliEvent::new(EventType::Text, EventRole::Assistant, content).with_raw(raw)
    };

    Classified {
        event,
        ask_user,
        result_meta: None,
    }
}

/// Render a tool-result payload: lists concatenate the `text` fields of
/// their object sub-blocks with single spaces.
fn render_tool_result(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|block| block.is_object())
            .map(|block| block.get("text").and_then(Value::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a final-result payload: strings pass through, objects prefer
/// their `text` field, anything else renders empty.
fn render_result(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .map_or_else(|| result.to_string(), ToOwned::to_owned),
        _ => String::new(),
    }
}

/// Render a system notice from its `message` or `text` field.
fn render_notice(message: &Value, text: &Value) -> String {
    let value = if message.is_null() { text } else { message };
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
