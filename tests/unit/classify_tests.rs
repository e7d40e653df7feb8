//! Unit tests for the event classifier.
//!
//! Each classification rule is exercised with a representative record;
//! every record yields exactly one event, and nothing is ever dropped.

use serde_json::{json, Value};

use agent_console::models::event::{EventRole, EventType};
use agent_console::protocol::classify::{
    classify_line, classify_record, ends_with_question_mark, ASK_USER_TOOL, RESULT_TEXT_LIMIT,
    UNKNOWN_RECORD_LIMIT,
};

// ── Rule 1: unparseable lines degrade to raw_text ────────────────────────────

#[test]
fn unparseable_line_becomes_raw_text() {
    let classified = classify_line("not json");

    assert_eq!(classified.event.event_type, EventType::RawText);
    assert_eq!(classified.event.role, EventRole::System);
    assert_eq!(classified.event.content.text.as_deref(), Some("not json"));
    assert!(classified.ask_user.is_none());
    assert!(classified.result_meta.is_none());
}

// ── Rule 2: assistant messages ───────────────────────────────────────────────

#[test]
fn assistant_text_block_becomes_text_event() {
    let classified = classify_line(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello"}]}}"#,
    );

    assert_eq!(classified.event.event_type, EventType::Text);
    assert_eq!(classified.event.role, EventRole::Assistant);
    assert_eq!(classified.event.content.text.as_deref(), Some("Hello"));
    assert!(classified.event.content.tools.is_none());
}

#[test]
fn assistant_multiple_text_blocks_are_joined_with_newlines() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "text", "text": "one"},
            {"type": "text", "text": "two"},
        ]},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.content.text.as_deref(), Some("one\ntwo"));
}

#[test]
fn assistant_tool_only_message_becomes_tool_use_event() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "tool_use", "name": "Bash", "input": {"command": "ls"}},
        ]},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::ToolUse);
    assert_eq!(classified.event.role, EventRole::Assistant);
    let tools = classified.event.content.tools.expect("tool list");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "Bash");
    assert!(tools[0].input.contains("command"));
    assert!(classified.ask_user.is_none());
}

#[test]
fn assistant_text_and_tools_becomes_text_event_with_tool_list() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "text", "text": "running it"},
            {"type": "tool_use", "name": "Bash", "input": {"command": "ls"}},
        ]},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::Text);
    assert_eq!(classified.event.content.text.as_deref(), Some("running it"));
    assert_eq!(classified.event.content.tools.expect("tools").len(), 1);
}

#[test]
fn assistant_unknown_block_types_are_ignored() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "thinking", "thinking": "hmm"},
            {"type": "text", "text": "answer"},
        ]},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::Text);
    assert_eq!(classified.event.content.text.as_deref(), Some("answer"));
}

#[test]
fn assistant_tool_input_rendering_is_bounded() {
    let long_value = "x".repeat(500);
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "tool_use", "name": "Write", "input": {"content": long_value}},
        ]},
    });
    let classified = classify_record(record);

    let tools = classified.event.content.tools.expect("tools");
    assert_eq!(tools[0].input.chars().count(), 200);
    assert!(tools[0].input.ends_with("..."));
}

#[test]
fn ask_user_tool_produces_question_signal() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "tool_use", "name": ASK_USER_TOOL,
             "input": {"questions": [{"question": "Proceed?"}]}},
        ]},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::ToolUse);
    let questions = classified.ask_user.expect("ask_user signal");
    assert_eq!(questions.len(), 1);
    assert_eq!(
        questions[0].get("question").and_then(Value::as_str),
        Some("Proceed?")
    );
}

#[test]
fn ask_user_tool_with_no_questions_key_signals_empty_list() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "tool_use", "name": ASK_USER_TOOL, "input": {}},
        ]},
    });
    let classified = classify_record(record);

    assert_eq!(classified.ask_user.expect("signal").len(), 0);
}

#[test]
fn non_ask_tool_does_not_signal_questions() {
    let record = json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "tool_use", "name": "Read", "input": {"questions": [{"question": "?"}]}},
        ]},
    });
    let classified = classify_record(record);

    assert!(classified.ask_user.is_none());
}

// ── Rule 3: streaming deltas ─────────────────────────────────────────────────

#[test]
fn text_delta_carries_fragment() {
    let record = json!({
        "type": "content_block_delta",
        "delta": {"type": "text_delta", "text": "frag"},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::Text);
    assert_eq!(classified.event.role, EventRole::Assistant);
    assert_eq!(classified.event.content.text.as_deref(), Some("frag"));
}

#[test]
fn non_text_delta_carries_empty_fragment() {
    let record = json!({
        "type": "content_block_delta",
        "delta": {"type": "input_json_delta", "partial_json": "{"},
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::Text);
    assert_eq!(classified.event.content.text.as_deref(), Some(""));
}

// ── Rule 4: tool results ─────────────────────────────────────────────────────

#[test]
fn tool_result_string_payload_passes_through() {
    let record = json!({"type": "tool_result", "content": "file written"});
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::ToolResult);
    assert_eq!(classified.event.role, EventRole::Tool);
    assert_eq!(classified.event.content.text.as_deref(), Some("file written"));
}

#[test]
fn tool_result_block_list_concatenates_text_fields() {
    let record = json!({
        "type": "tool_result",
        "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}],
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.content.text.as_deref(), Some("a b"));
}

#[test]
fn tool_result_payload_is_bounded() {
    let record = json!({"type": "tool_result", "content": "y".repeat(1000)});
    let classified = classify_record(record);

    let text = classified.event.content.text.expect("text");
    assert_eq!(text.chars().count(), RESULT_TEXT_LIMIT);
    assert!(text.ends_with("..."));
}

// ── Rule 5: final results ────────────────────────────────────────────────────

#[test]
fn result_record_carries_summary_and_metadata() {
    let record = json!({
        "type": "result",
        "result": "all done",
        "cost_usd": 0.02,
        "duration_ms": 1500,
        "session_id": "abc123",
        "stop_reason": "end_turn",
    });
    let classified = classify_record(record);

    assert_eq!(classified.event.event_type, EventType::Result);
    assert_eq!(classified.event.role, EventRole::System);
    assert_eq!(classified.event.content.text.as_deref(), Some("all done"));
    assert_eq!(classified.event.content.cost_usd, Some(0.02));
    assert_eq!(classified.event.content.duration_ms, Some(1500));
    assert_eq!(classified.event.content.session_id.as_deref(), Some("abc123"));

    let meta = classified.result_meta.expect("result meta");
    assert_eq!(meta.session_id.as_deref(), Some("abc123"));
    assert_eq!(meta.cost_usd, Some(0.02));
    assert_eq!(meta.duration_ms, Some(1500));
    assert_eq!(meta.stop_reason.as_deref(), Some("end_turn"));
}

#[test]
fn result_record_tolerates_absent_fields() {
    let classified = classify_record(json!({"type": "result"}));

    assert_eq!(classified.event.content.text.as_deref(), Some(""));
    let meta = classified.result_meta.expect("result meta");
    assert!(meta.session_id.is_none());
    assert!(meta.cost_usd.is_none());
    assert!(meta.duration_ms.is_none());
    assert!(meta.stop_reason.is_none());
}

#[test]
fn result_object_payload_prefers_text_field() {
    let record = json!({"type": "result", "result": {"text": "summary text"}});
    let classified = classify_record(record);

    assert_eq!(classified.event.content.text.as_deref(), Some("summary text"));
}

// ── Rule 6: system notices ───────────────────────────────────────────────────

#[test]
fn system_record_becomes_system_summary() {
    let classified = classify_record(json!({"type": "system", "message": "init done"}));

    assert_eq!(classified.event.event_type, EventType::SystemSummary);
    assert_eq!(classified.event.role, EventRole::System);
    assert_eq!(classified.event.content.text.as_deref(), Some("init done"));
}

#[test]
fn system_record_falls_back_to_text_field() {
    let classified = classify_record(json!({"type": "system", "text": "from text"}));

    assert_eq!(classified.event.content.text.as_deref(), Some("from text"));
}

// ── Rule 7: unknown discriminants ────────────────────────────────────────────

#[test]
fn unknown_discriminant_becomes_unknown_event() {
    let classified = classify_record(json!({"type": "telemetry", "data": [1, 2, 3]}));

    assert_eq!(classified.event.event_type, EventType::Unknown);
    assert_eq!(classified.event.role, EventRole::System);
    let text = classified.event.content.text.expect("rendered record");
    assert!(text.contains("telemetry"));
}

#[test]
fn unknown_record_rendering_is_bounded() {
    let classified = classify_record(json!({"type": "blob", "data": "z".repeat(1000)}));

    let text = classified.event.content.text.expect("rendered record");
    assert_eq!(text.chars().count(), UNKNOWN_RECORD_LIMIT);
    assert!(text.ends_with("..."));
}

#[test]
fn non_object_json_becomes_unknown_event() {
    let classified = classify_line("\"just a string\"");

    assert_eq!(classified.event.event_type, EventType::Unknown);
}

// ── Raw record retention ─────────────────────────────────────────────────────

#[test]
fn parsed_records_retain_raw_value() {
    let classified = classify_line(r#"{"type":"system","message":"hi"}"#);
    let raw = classified.event.raw.expect("raw value");
    assert_eq!(raw.get("type").and_then(Value::as_str), Some("system"));
}

#[test]
fn raw_text_events_have_no_raw_value() {
    let classified = classify_line("plain");
    assert!(classified.event.raw.is_none());
}

// ── Implicit question predicate ──────────────────────────────────────────────

#[test]
fn question_predicate_matches_trailing_question_mark() {
    assert!(ends_with_question_mark("Should I continue?"));
    assert!(ends_with_question_mark("Should I continue?  \n"));
}

#[test]
fn question_predicate_rejects_statements() {
    assert!(!ends_with_question_mark("Done."));
    assert!(!ends_with_question_mark(""));
    assert!(!ends_with_question_mark("? but not at the end"));
}
