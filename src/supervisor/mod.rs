//! Session supervision: process spawning, stream readers, and the
//! session manager owning the lifecycle state machine.

pub mod manager;
pub mod reader;
pub mod spawner;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::session::ExecutionSession;

pub use manager::SessionManager;

/// Shared handle to one session. The per-session mutex is the only
/// synchronization between the manager and that session's reader tasks.
pub type SessionHandle = Arc<Mutex<ExecutionSession>>;
