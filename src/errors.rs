//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Agent executable or workflow reference could not be resolved.
    Resolution(String),
    /// Requested session does not exist.
    NotFound(String),
    /// Operation is not legal in the session's current state.
    Precondition(String),
    /// Agent process failed to spawn.
    Spawn(String),
    /// Stream protocol framing failure (e.g. oversized line).
    Protocol(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Resolution(msg) => write!(f, "resolution: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Precondition(msg) => write!(f, "precondition: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
