//! Per-session stream readers and terminal reconciliation.
//!
//! Each running session owns three tasks: a primary reader over the agent's
//! stdout (classification, question detection, accumulator updates), a
//! diagnostic reader over stderr, and a reconciler that waits for both
//! readers to finish before settling the terminal state. All three respect
//! the session's [`CancellationToken`]: resuming or stopping a session
//! cancels the whole generation, and cancelled tasks exit silently without
//! touching terminal state.

use futures_util::StreamExt;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::event::{CliEvent, EventContent, EventRole, EventType};
use crate::models::session::{ExecutionState, PendingQuestion};
use crate::notify::{Notification, Notifier};
use crate::protocol::classify::{
    classify_line, ends_with_question_mark, Classified, ResultMeta, STOP_REASON_END_TURN,
};
use crate::protocol::codec::LineCodec;
use crate::supervisor::spawner;
use crate::supervisor::SessionHandle;
use crate::AppError;

/// Context string for questions detected via the structured tool.
const STRUCTURED_QUESTION_CONTEXT: &str = "The assistant is asking structured questions.";
/// Context string for questions detected via the implicit heuristic.
const IMPLICIT_QUESTION_CONTEXT: &str = "The assistant is waiting for your response.";
/// Question text used when the structured questions list is empty.
const FALLBACK_QUESTION_TEXT: &str = "Structured question";

/// Launch the reader generation for a freshly spawned process and return
/// the reconciler's join handle.
pub(crate) fn launch(
    session: SessionHandle,
    notifier: Notifier,
    stdout: ChildStdout,
    stderr: ChildStderr,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let primary = tokio::spawn(read_primary(
        session.clone(),
        notifier.clone(),
        stdout,
        cancel.clone(),
    ));
    let diagnostic = tokio::spawn(read_diagnostic(
        session.clone(),
        notifier.clone(),
        stderr,
        cancel.clone(),
    ));
    tokio::spawn(reconcile(session, notifier, primary, diagnostic, cancel))
}

/// Primary reader: classify each stdout line, append it, forward it, and
/// run question detection.
async fn read_primary(
    session: SessionHandle,
    notifier: Notifier,
    stdout: ChildStdout,
    cancel: CancellationToken,
) {
    let mut frames = FramedRead::new(stdout, LineCodec::new());
    let mut last_assistant_text = String::new();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("primary reader: cancellation received, stopping");
                return;
            }

            item = frames.next() => {
                match item {
                    None => break,
                    Some(Err(AppError::Protocol(msg))) => {
                        warn!(error = msg.as_str(), "primary reader: framing error, skipping line");
                    }
                    Some(Err(err)) => {
                        warn!(%err, "primary reader: stream error, stopping");
                        break;
                    }
                    Some(Ok(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        handle_line(&session, &notifier, line, &mut last_assistant_text).await;
                    }
                }
            }
        }
    }
}

/// Diagnostic reader: wrap each stderr line as a fixed `stderr` event.
async fn read_diagnostic(
    session: SessionHandle,
    notifier: Notifier,
    stderr: ChildStderr,
    cancel: CancellationToken,
) {
    let mut frames = FramedRead::new(stderr, LineCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("diagnostic reader: cancellation received, stopping");
                return;
            }

            item = frames.next() => {
                match item {
                    None => break,
                    Some(Err(err)) => {
                        warn!(%err, "diagnostic reader: framing error, skipping line");
                    }
                    Some(Ok(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let event = CliEvent::new(
                            EventType::Stderr,
                            EventRole::Error,
                            EventContent::text(line),
                        );
                        let execution_id = {
                            let mut guard = session.lock().await;
                            guard.events.push(event.clone());
                            guard.id.clone()
                        };
                        notifier.emit(Notification::cli_event(&execution_id, &event)).await;
                    }
                }
            }
        }
    }
}

/// Reconciler: once both readers finish, wait for process exit and settle
/// the terminal state unless the session is awaiting input or was stopped.
///
/// The process wait is unbounded (the agent may close its pipes and keep
/// running), so the child is borrowed out of the session and awaited with
/// the lock released; the lock is reacquired only to record the outcome.
/// Cancellation mid-wait hands the child back so a stop can terminate it.
async fn reconcile(
    session: SessionHandle,
    notifier: Notifier,
    primary: JoinHandle<()>,
    diagnostic: JoinHandle<()>,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;

        () = cancel.cancelled() => {
            debug!("reconciler: cancellation received, skipping terminal reconciliation");
            return;
        }

        () = async {
            let _ = tokio::join!(primary, diagnostic);
        } => {}
    }

    let mut child = {
        let mut guard = session.lock().await;
        if guard.state == ExecutionState::AwaitingInput || guard.state.is_terminal() {
            return;
        }
        match guard.process.take() {
            Some(child) => child,
            None => {
                guard.finish(
                    ExecutionState::Failed,
                    Some("agent process handle missing".to_owned()),
                );
                let summary = guard.summary();
                drop(guard);
                notifier.emit(Notification::state_change(summary)).await;
                return;
            }
        }
    };

    let outcome = tokio::select! {
        biased;

        () = cancel.cancelled() => None,
        outcome = child.wait() => Some(outcome),
    };

    let Some(outcome) = outcome else {
        // A stop or resume owns termination now; hand the process back.
        session.lock().await.process = Some(child);
        debug!("reconciler: cancelled during process wait, returning process");
        return;
    };

    let summary = {
        let mut guard = session.lock().await;
        if guard.state == ExecutionState::AwaitingInput || guard.state.is_terminal() {
            return;
        }

        match outcome {
            Ok(status) if status.success() => {
                guard.finish(ExecutionState::Completed, None);
            }
            Ok(status) => {
                guard.finish(ExecutionState::Failed, Some(spawner::describe_exit(status)));
            }
            Err(err) => {
                guard.finish(
                    ExecutionState::Failed,
                    Some(format!("failed to wait for agent process: {err}")),
                );
            }
        }

        info!(
            session_id = guard.id.as_str(),
            state = %guard.state,
            error = guard.error.as_deref().unwrap_or(""),
            "session reached terminal state"
        );
        guard.summary()
    };

    notifier.emit(Notification::state_change(summary)).await;
}

/// Classify one non-blank line and apply its effects to the session.
async fn handle_line(
    session: &SessionHandle,
    notifier: &Notifier,
    line: &str,
    last_assistant_text: &mut String,
) {
    let Classified {
        event,
        ask_user,
        result_meta,
    } = classify_line(line);

    // Track the most recent non-empty assistant text for the implicit
    // question heuristic.
    if event.role == EventRole::Assistant && event.event_type == EventType::Text {
        if let Some(text) = event.content.text.as_deref() {
            if !text.is_empty() {
                *last_assistant_text = text.to_owned();
            }
        }
    }

    let execution_id = {
        let mut guard = session.lock().await;
        guard.events.push(event.clone());
        guard.id.clone()
    };
    notifier
        .emit(Notification::cli_event(&execution_id, &event))
        .await;

    if let Some(questions) = ask_user {
        apply_structured_question(session, notifier, &execution_id, questions).await;
    }

    if let Some(meta) = result_meta {
        apply_result_meta(session, notifier, &execution_id, meta, last_assistant_text).await;
    }
}

/// Structured detection: the agent invoked the ask-the-user tool.
async fn apply_structured_question(
    session: &SessionHandle,
    notifier: &Notifier,
    execution_id: &str,
    questions: Vec<serde_json::Value>,
) {
    let text = questions
        .first()
        .map_or(FALLBACK_QUESTION_TEXT, |entry| {
            entry
                .get("question")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
        })
        .to_owned();

    let summary = {
        let mut guard = session.lock().await;
        guard.state = ExecutionState::AwaitingInput;
        guard.pending_question = Some(PendingQuestion {
            text,
            context: STRUCTURED_QUESTION_CONTEXT.to_owned(),
        });
        guard.summary()
    };

    info!(session_id = execution_id, "structured question detected");
    notifier
        .emit(Notification::StructuredQuestionDetected {
            execution_id: execution_id.to_owned(),
            questions,
        })
        .await;
    notifier.emit(Notification::state_change(summary)).await;
}

/// Apply `result` metadata: resume token capture, accumulator updates, and
/// the implicit question heuristic.
async fn apply_result_meta(
    session: &SessionHandle,
    notifier: &Notifier,
    execution_id: &str,
    meta: ResultMeta,
    last_assistant_text: &str,
) {
    let question_fired = {
        let mut guard = session.lock().await;
        guard.record_agent_session_id(meta.session_id.as_deref());
        if let Some(cost) = meta.cost_usd {
            guard.cost_usd += cost;
        }
        if let Some(duration) = meta.duration_ms {
            guard.duration_ms += duration;
        }

        let fires = guard.state != ExecutionState::AwaitingInput
            && meta.stop_reason.as_deref() == Some(STOP_REASON_END_TURN)
            && ends_with_question_mark(last_assistant_text);
        if fires {
            guard.state = ExecutionState::AwaitingInput;
            guard.pending_question = Some(PendingQuestion {
                text: last_assistant_text.trim().to_owned(),
                context: IMPLICIT_QUESTION_CONTEXT.to_owned(),
            });
        }
        fires.then(|| (guard.pending_question.clone(), guard.summary()))
    };

    if let Some((Some(question), summary)) = question_fired {
        info!(session_id = execution_id, "implicit question detected");
        notifier
            .emit(Notification::QuestionDetected {
                execution_id: execution_id.to_owned(),
                question,
            })
            .await;
        notifier.emit(Notification::state_change(summary)).await;
    }
}
