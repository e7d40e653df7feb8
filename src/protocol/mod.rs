//! Agent stream protocol: line framing, record model, and classification.

pub mod classify;
pub mod codec;
pub mod record;
