/// Task state definitions for tracking crawl progress
///
/// Every resource task moves through these states exactly once.
use crate::FetchErrorKind;
use std::fmt;

/// Represents the current state of a resource task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task has been submitted and is waiting for a worker
    Queued,

    /// A worker is fetching or extracting
    Running,

    // ===== Terminal States =====
    /// Content was fetched and a report was produced
    Completed,

    /// Content could not be obtained
    Failed(FetchErrorKind),

    /// Dropped without processing because the run was aborted
    Cancelled,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the task may still be processed
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Checks whether moving from this state to `next` is allowed
    ///
    /// Queued tasks either start or are cancelled; running tasks end in one
    /// of the terminal states. Terminal states never change.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed(_) | Self::Cancelled
            ),
            _ => false,
        }
    }

    /// Short lowercase label used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed(FetchErrorKind::Timeout) => "failed (timeout)",
            Self::Failed(FetchErrorKind::Network) => "failed (network)",
            Self::Failed(FetchErrorKind::Other) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
