//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: Lifecycle of an individual resource task (queued, running, completed, ...)
//! - `VisitedSet`: Canonical URLs already scheduled during one seed's recursive crawl

mod task_state;
mod visited;

// Re-export main types
pub use task_state::TaskState;
pub use visited::VisitedSet;
