//! Shared data models.

pub mod decaf;

// Re-export commonly used types
pub use decaf::{AggregateResult, BackendKind, ConnectionInfo};
