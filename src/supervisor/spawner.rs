//! Agent process spawner.
//!
//! Resolves the agent executable on the search path, builds the stream-json
//! invocation, and spawns the child with `kill_on_drop(true)` so processes
//! are cleaned up automatically. The `CLAUDECODE` environment variable is
//! stripped from the child so the spawned agent does not refuse to start
//! inside what it thinks is a nested session.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{info, warn};

use crate::{AppError, Result};

/// Environment variable removed from the child's environment.
pub const STRIPPED_ENV_VAR: &str = "CLAUDECODE";

/// Fixed arguments selecting the machine-readable output mode.
const STREAM_ARGS: &[&str] = &[
    "--output-format",
    "stream-json",
    "--verbose",
    "--dangerously-skip-permissions",
];

/// A freshly spawned agent process with its output pipes detached.
#[derive(Debug)]
pub struct SpawnedAgent {
    /// Child handle — kept alive so `kill_on_drop` works.
    pub child: Child,
    /// Primary output channel (stream-json records).
    pub stdout: ChildStdout,
    /// Diagnostic output channel.
    pub stderr: ChildStderr,
}

/// Resolve the agent executable.
///
/// A name containing a path separator is treated as an explicit path and
/// must exist as an executable file as-is; a bare name is searched on
/// `PATH`. A file without the execute permission does not resolve.
///
/// # Errors
///
/// Returns [`AppError::Resolution`] if no executable can be found.
pub fn resolve_agent_bin(agent_bin: &str) -> Result<PathBuf> {
    let candidate = Path::new(agent_bin);
    if candidate.components().count() > 1 {
        if is_executable(candidate) {
            return Ok(candidate.to_path_buf());
        }
        return Err(AppError::Resolution(format!(
            "agent executable not found or not executable: {agent_bin}"
        )));
    }

    let path_var = env::var_os("PATH")
        .ok_or_else(|| AppError::Resolution("PATH is not set in the environment".into()))?;
    for dir in env::split_paths(&path_var) {
        let full = dir.join(agent_bin);
        if is_executable(&full) {
            return Ok(full);
        }
    }

    Err(AppError::Resolution(format!(
        "agent executable `{agent_bin}` not found on PATH"
    )))
}

/// Whether `path` is a regular file the current process may execute.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Spawn an agent process in stream-json mode.
///
/// The prompt is passed via `-p`; a resume token, when present, continues
/// the prior conversation via `--resume`. Both output channels are piped,
/// stdin is closed.
///
/// # Errors
///
/// Returns [`AppError::Spawn`] if the OS fails to start the process or an
/// output pipe cannot be captured.
pub fn spawn_agent(
    bin: &Path,
    base_dir: &Path,
    prompt: &str,
    resume_token: Option<&str>,
) -> Result<SpawnedAgent> {
    let mut cmd = Command::new(bin);
    cmd.arg("-p").arg(prompt);
    if let Some(token) = resume_token {
        cmd.arg("--resume").arg(token);
    }
    cmd.args(STREAM_ARGS)
        .current_dir(base_dir)
        .env_remove(STRIPPED_ENV_VAR)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Spawn(format!("failed to spawn agent: {err}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture agent stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture agent stderr".into()))?;

    info!(
        pid = child.id().unwrap_or(0),
        bin = %bin.display(),
        resumed = resume_token.is_some(),
        "agent process spawned"
    );

    Ok(SpawnedAgent {
        child,
        stdout,
        stderr,
    })
}

/// Terminate a child process: graceful signal first, forceful kill after
/// the grace period elapses. Errors from an already-gone process are
/// logged, never propagated.
pub async fn terminate_child(child: &mut Child, grace: Duration) {
    if let Ok(Some(status)) = child.try_wait() {
        info!(?status, "agent process already exited");
        return;
    }

    send_graceful_signal(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            info!(?status, "agent process exited within grace period");
        }
        Ok(Err(err)) => {
            warn!(%err, "error waiting for agent process");
        }
        Err(_elapsed) => {
            warn!(
                grace_secs = grace.as_secs(),
                "agent process did not exit within grace period, forcing kill"
            );
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to force-kill agent process");
            }
        }
    }
}

/// Describe a process exit status for error reporting.
#[must_use]
pub fn describe_exit(status: std::process::ExitStatus) -> String {
    status.code().map_or_else(
        || "process terminated by signal".to_owned(),
        |code| format!("process exited with code {code}"),
    )
}

#[cfg(unix)]
fn send_graceful_signal(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(%err, pid, "failed to send SIGTERM to agent process");
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(child: &mut Child) {
    // No portable graceful signal; issue the kill immediately and let the
    // grace-period wait below collect the exit status.
    if let Err(err) = child.start_kill() {
        warn!(%err, "failed to signal agent process");
    }
}
