#![forbid(unsafe_code)]

//! Execution session manager.
//!
//! Supervises long-running AI agent CLI processes, turning their
//! newline-delimited stream-json output into a typed event history and a
//! lifecycle state machine that observers (an API layer, a broadcast
//! channel) consume through snapshots and notifications.

pub mod config;
pub mod errors;
pub mod models;
pub mod notify;
pub mod protocol;
pub mod supervisor;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
