//! Session manager: owns the session map and the lifecycle entry points.
//!
//! All map mutation happens through the manager's own operations
//! (`start` / `answer` / `stop`); reader tasks only ever mutate the session
//! object they were handed. Each session's readers are tracked as one
//! generation keyed by session id and replaced wholesale on resume, so
//! readers belonging to an exited process can never mutate a session after
//! a new process has started.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

use crate::config::GlobalConfig;
use crate::models::event::CliEvent;
use crate::models::session::{ExecutionSession, ExecutionState, SessionSummary, SessionType};
use crate::notify::{Notification, Notifier};
use crate::supervisor::{reader, spawner, SessionHandle};
use crate::{AppError, Result};

/// Workflow name recorded for interactive workflow-creation sessions.
const WORKFLOW_CREATION_NAME: &str = "workflow-creation";

/// One generation of reader tasks for a session. Replaced wholesale when
/// the session resumes with a new process.
struct ReaderSet {
    cancel: CancellationToken,
    reconciler: JoinHandle<()>,
}

/// Supervises agent executions: spawning, resuming, stopping, and
/// observation via snapshots and notifications.
pub struct SessionManager {
    config: GlobalConfig,
    notifier: Notifier,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    readers: Mutex<HashMap<String, ReaderSet>>,
}

impl SessionManager {
    /// Construct a manager. The notification channel, when provided, is
    /// shared read-only across all sessions for the manager's lifetime.
    #[must_use]
    pub fn new(config: GlobalConfig, notify_tx: Option<mpsc::Sender<Notification>>) -> Self {
        Self {
            config,
            notifier: notify_tx.map_or_else(Notifier::disabled, Notifier::new),
            sessions: Mutex::new(HashMap::new()),
            readers: Mutex::new(HashMap::new()),
        }
    }

    /// Start executing an existing workflow.
    ///
    /// Validates that the agent executable and the workflow definition are
    /// resolvable before any session is constructed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Resolution`] if the executable or workflow is
    /// missing (no session is created), or [`AppError::Spawn`] if the
    /// process fails to start (the session is created and marked failed).
    pub async fn start_execution(&self, workflow_name: &str) -> Result<SessionSummary> {
        let span = info_span!("start_execution", workflow = workflow_name);
        let _guard = span.enter();

        let bin = spawner::resolve_agent_bin(&self.config.agent_bin)?;
        let workflow_path = self.config.workflows_dir().join(workflow_name);
        if !workflow_path.exists() {
            return Err(AppError::Resolution(format!(
                "workflow not found: {}",
                workflow_path.display()
            )));
        }

        let prompt = format!("@orchestrator workflows/{workflow_name}");
        let session = ExecutionSession::new(workflow_name, SessionType::Execution);
        self.launch_session(session, &bin, &prompt).await
    }

    /// Start an interactive workflow-creation session from a stated goal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Resolution`] if the executable is missing, or
    /// [`AppError::Spawn`] if the process fails to start.
    pub async fn start_workflow_session(&self, goal: &str) -> Result<SessionSummary> {
        let span = info_span!("start_workflow_session");
        let _guard = span.enter();

        let bin = spawner::resolve_agent_bin(&self.config.agent_bin)?;
        let prompt = format!("@workflow-mapper\n{goal}");
        let session = ExecutionSession::new(WORKFLOW_CREATION_NAME, SessionType::WorkflowCreation);
        self.launch_session(session, &bin, &prompt).await
    }

    /// Answer a session's pending question and resume it.
    ///
    /// Cancels the stale reader generation (its process has exited) and
    /// spawns a new process continuing the conversation via the stored
    /// resume token, with the answer as its prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id,
    /// [`AppError::Precondition`] when the session is not awaiting input or
    /// has no resume token, [`AppError::Resolution`] if the executable is
    /// gone, or [`AppError::Spawn`] if the resumed process fails to start.
    pub async fn answer_question(&self, execution_id: &str, answer: &str) -> Result<SessionSummary> {
        let span = info_span!("answer_question", session_id = execution_id);
        let _guard = span.enter();

        let handle = self.session_handle(execution_id).await?;

        let token = {
            let guard = handle.lock().await;
            if guard.state != ExecutionState::AwaitingInput {
                return Err(AppError::Precondition(format!(
                    "session {execution_id} is not awaiting input (state: {})",
                    guard.state
                )));
            }
            guard.agent_session_id.clone().ok_or_else(|| {
                AppError::Precondition(format!(
                    "no resume token recorded for session {execution_id}"
                ))
            })?
        };

        let bin = spawner::resolve_agent_bin(&self.config.agent_bin)?;

        // Retire the previous generation (its process has exited) before
        // leaving `awaiting_input`, so none of its tasks can observe the
        // transition.
        self.cancel_readers(execution_id).await;

        let summary = {
            let mut guard = handle.lock().await;
            guard.pending_question = None;
            guard.state = ExecutionState::Running;
            guard.summary()
        };
        self.notifier.emit(Notification::state_change(summary)).await;

        match spawner::spawn_agent(&bin, &self.config.base_dir, answer, Some(&token)) {
            Ok(spawned) => {
                let summary = {
                    let mut guard = handle.lock().await;
                    guard.process = Some(spawned.child);
                    guard.summary()
                };
                self.attach_readers(execution_id, &handle, spawned.stdout, spawned.stderr)
                    .await;
                info!(session_id = execution_id, "session resumed with answer");
                Ok(summary)
            }
            Err(err) => Err(self.fail_session(&handle, err).await),
        }
    }

    /// Stop a session, idempotently.
    ///
    /// Terminal sessions are returned unchanged. Otherwise the reader
    /// generation is cancelled first (no events are appended after the
    /// transition), the process is terminated gracefully with the
    /// configured grace period, and the session settles as `stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id.
    pub async fn stop_execution(&self, execution_id: &str) -> Result<SessionSummary> {
        let span = info_span!("stop_execution", session_id = execution_id);
        let _guard = span.enter();

        let handle = self.session_handle(execution_id).await?;

        {
            let guard = handle.lock().await;
            if guard.state.is_terminal() {
                return Ok(guard.summary());
            }
        }

        self.cancel_readers(execution_id).await;

        // Borrow the child out so the grace-period wait never blocks
        // snapshot reads of this session (or a listing across all of them).
        let child = {
            let mut guard = handle.lock().await;
            if guard.state.is_terminal() {
                return Ok(guard.summary());
            }
            guard.process.take()
        };
        if let Some(mut child) = child {
            spawner::terminate_child(&mut child, Duration::from_secs(self.config.grace_seconds))
                .await;
        }

        let summary = {
            let mut guard = handle.lock().await;
            if guard.state.is_terminal() {
                return Ok(guard.summary());
            }
            guard.pending_question = None;
            guard.finish(ExecutionState::Stopped, None);
            guard.summary()
        };

        self.notifier
            .emit(Notification::state_change(summary.clone()))
            .await;
        info!(session_id = execution_id, "session stopped");
        Ok(summary)
    }

    /// Snapshot of one session, if it exists.
    pub async fn get(&self, execution_id: &str) -> Option<SessionSummary> {
        let handle = {
            let sessions = self.sessions.lock().await;
            sessions.get(execution_id).cloned()
        }?;
        let guard = handle.lock().await;
        Some(guard.summary())
    }

    /// Snapshots of all sessions, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = {
            let sessions = self.sessions.lock().await;
            sessions.values().cloned().collect()
        };
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.lock().await.summary());
        }
        summaries.sort_by_key(|summary| summary.started_at);
        summaries
    }

    /// Full event history of one session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id.
    pub async fn events(&self, execution_id: &str) -> Result<Vec<CliEvent>> {
        let handle = self.session_handle(execution_id).await?;
        let guard = handle.lock().await;
        Ok(guard.events.clone())
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    /// Spawn the process for a freshly constructed session and register it.
    ///
    /// On spawn failure the session is still registered, marked failed, and
    /// the error is returned to the caller.
    async fn launch_session(
        &self,
        mut session: ExecutionSession,
        bin: &Path,
        prompt: &str,
    ) -> Result<SessionSummary> {
        let execution_id = session.id.clone();

        match spawner::spawn_agent(bin, &self.config.base_dir, prompt, None) {
            Ok(spawned) => {
                session.process = Some(spawned.child);
                session.state = ExecutionState::Running;
                let summary = session.summary();
                let handle: SessionHandle = Arc::new(Mutex::new(session));
                self.sessions
                    .lock()
                    .await
                    .insert(execution_id.clone(), handle.clone());

                self.notifier
                    .emit(Notification::state_change(summary.clone()))
                    .await;
                self.attach_readers(&execution_id, &handle, spawned.stdout, spawned.stderr)
                    .await;

                info!(
                    session_id = execution_id.as_str(),
                    workflow = summary.workflow_name.as_str(),
                    "session started"
                );
                Ok(summary)
            }
            Err(err) => {
                let handle: SessionHandle = Arc::new(Mutex::new(session));
                self.sessions
                    .lock()
                    .await
                    .insert(execution_id, handle.clone());
                Err(self.fail_session(&handle, err).await)
            }
        }
    }

    /// Attach a fresh reader generation to a session.
    async fn attach_readers(
        &self,
        execution_id: &str,
        handle: &SessionHandle,
        stdout: tokio::process::ChildStdout,
        stderr: tokio::process::ChildStderr,
    ) {
        let cancel = CancellationToken::new();
        let reconciler = reader::launch(
            handle.clone(),
            self.notifier.clone(),
            stdout,
            stderr,
            cancel.clone(),
        );
        self.readers
            .lock()
            .await
            .insert(execution_id.to_owned(), ReaderSet { cancel, reconciler });
    }

    /// Cancel a session's current reader generation, if any, and wait for
    /// its reconciler to retire. Once this returns, no task of the old
    /// generation can mutate the session or hold its process handle.
    async fn cancel_readers(&self, execution_id: &str) {
        let set = self.readers.lock().await.remove(execution_id);
        if let Some(set) = set {
            set.cancel.cancel();
            if let Err(err) = set.reconciler.await {
                warn!(%err, session_id = execution_id, "reconciler task panicked");
            }
        }
    }

    /// Mark a session failed after a spawn error and emit the transition.
    async fn fail_session(&self, handle: &SessionHandle, err: AppError) -> AppError {
        let summary = {
            let mut guard = handle.lock().await;
            guard.pending_question = None;
            guard.finish(ExecutionState::Failed, Some(err.to_string()));
            guard.summary()
        };
        self.notifier.emit(Notification::state_change(summary)).await;
        err
    }

    /// Look up a session handle.
    async fn session_handle(&self, execution_id: &str) -> Result<SessionHandle> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(execution_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {execution_id} not found")))
    }
}
