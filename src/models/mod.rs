//! Domain entities: structured events and execution sessions.

pub mod event;
pub mod session;
