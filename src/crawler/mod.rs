//! Crawler module for resource fetching and recursive discovery
//!
//! This module contains the core crawling logic, including:
//! - Task and depth types flowing through the queue
//! - HTTP and local fetching with manual body decoding
//! - The bounded task queue shared by the worker pool
//! - Optional browser rendering
//! - Overall crawl orchestration

#[cfg(feature = "browser")]
mod chromium;
mod coordinator;
mod decode;
mod fetcher;
mod render;
mod scheduler;
mod task;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumBackend, CHROME_PATH_ENV};
pub use coordinator::{CrawlOrchestrator, CrawlOutcome, Expansion};
pub use decode::{decode_body, ContentEncoding};
pub use fetcher::{
    build_headers, build_http_client, classify_reqwest_error, read_local_file, ClientCache,
    ClientSettings, ContentFetcher, FetchSettings, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE,
    USER_AGENT,
};
pub use render::{
    render_deadline, IdleOutcome, IdleTracker, NetworkEvent, RenderBackend, DEFAULT_QUIET_PERIOD,
    DEFAULT_RENDER_TIMEOUT, RENDER_GRACE,
};
pub use scheduler::TaskQueue;
pub use task::{Depth, Origin, ResourceTask, Target};

use crate::config::Config;
use crate::Result;

/// Runs a complete crawl with the given configuration
///
/// This is a convenience entry point that builds a [`CrawlOrchestrator`]
/// without output handlers and runs it over `targets`.
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - Crawl completed
/// * `Err(JsRippleError)` - Configuration was rejected or a seed failed fatally
pub async fn crawl(config: &Config, targets: Vec<Target>) -> Result<CrawlOutcome> {
    CrawlOrchestrator::new(config)?.run(targets).await
}
