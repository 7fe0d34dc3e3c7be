//! Output handler traits and types
//!
//! This module defines the render hook invoked by the orchestrator for every
//! completed resource, and the errors output handlers may raise.

use crate::output::report::ResourceReport;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for incremental report consumers
///
/// The orchestrator calls [`record`](OutputHandler::record) once per
/// completed resource, serialized behind its own lock, before the task is
/// marked done. Calls arrive in completion order.
pub trait OutputHandler: Send + Sync {
    /// Records one completed resource
    ///
    /// # Arguments
    ///
    /// * `report` - The resource and the endpoints found in it
    fn record(&self, report: &ResourceReport) -> OutputResult<()>;
}
