//! Output module for reporting discovered endpoints
//!
//! This module handles:
//! - Per-resource reports and run metadata
//! - The render hook invoked as each resource completes
//! - Plain-text terminal output
//! - Task outcome statistics

mod cli;
mod report;
pub mod stats;
mod traits;

pub use cli::{print_summary, write_resource, write_summary, CliOutput};
pub use report::{Metadata, ResourceReport};
pub use stats::{print_statistics, write_statistics, CrawlStatistics};
pub use traits::{OutputError, OutputHandler, OutputResult};
