//! Browser rendering seam
//!
//! A [`RenderBackend`] is a drop-in replacement for the HTTP path of the
//! fetcher: it receives a URL and the fetch settings and returns the
//! rendered document. Backends report page network activity as
//! [`NetworkEvent`]s to an [`IdleTracker`], which decides when the page has
//! settled.

use crate::crawler::fetcher::FetchSettings;
use crate::FetchResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Quiet period with no requests in flight before a page counts as idle
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Upper bound on waiting for a page to settle
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time granted past navigation and idle waiting to read the document
pub const RENDER_GRACE: Duration = Duration::from_secs(5);

/// Outer deadline for one render
///
/// Navigation and the idle wait are each bounded by `timeout`, so the outer
/// guard only fires when a backend stops making progress altogether.
pub fn render_deadline(timeout: Duration) -> Duration {
    let timeout = if timeout.is_zero() {
        DEFAULT_RENDER_TIMEOUT
    } else {
        timeout
    };
    timeout * 2 + RENDER_GRACE
}

/// Renders a URL and returns the resulting document
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(&self, url: &str, settings: &FetchSettings) -> FetchResult<String>;
}

/// Network lifecycle of a page request, keyed by request id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestStarted(String),
    RequestFinished(String),
    RequestFailed(String),
}

/// How waiting for network idle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// No request was in flight for the whole quiet period
    Idle,
    /// The render timeout elapsed first
    TimedOut,
}

/// Waits for a page's network activity to settle
#[derive(Debug, Clone)]
pub struct IdleTracker {
    quiet: Duration,
    timeout: Duration,
}

impl IdleTracker {
    /// Creates a tracker for a render timeout
    ///
    /// A zero timeout uses [`DEFAULT_RENDER_TIMEOUT`]. Timeouts shorter than
    /// the default quiet period use half the timeout as the quiet period.
    pub fn new(timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            DEFAULT_RENDER_TIMEOUT
        } else {
            timeout
        };

        let mut quiet = DEFAULT_QUIET_PERIOD;
        if timeout < quiet {
            quiet = timeout / 2;
            if quiet.is_zero() {
                quiet = timeout;
            }
        }

        Self { quiet, timeout }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consumes events until the page is idle or the timeout elapses
    ///
    /// Requests finishing or failing without a matching start are ignored.
    /// If the sender side is dropped the tracker keeps waiting on timers only.
    pub async fn wait(&self, events: &mut mpsc::UnboundedReceiver<NetworkEvent>) -> IdleOutcome {
        let deadline = Instant::now() + self.timeout;
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut last_activity = Instant::now();
        let mut closed = false;

        loop {
            let wake = if in_flight.is_empty() {
                (last_activity + self.quiet).min(deadline)
            } else {
                deadline
            };

            tokio::select! {
                event = events.recv(), if !closed => match event {
                    Some(NetworkEvent::RequestStarted(id)) => {
                        in_flight.insert(id);
                        last_activity = Instant::now();
                    }
                    Some(NetworkEvent::RequestFinished(id)) | Some(NetworkEvent::RequestFailed(id)) => {
                        if in_flight.remove(&id) {
                            last_activity = Instant::now();
                        }
                    }
                    None => closed = true,
                },
                _ = sleep_until(wake) => {
                    let now = Instant::now();
                    if in_flight.is_empty() && now >= last_activity + self.quiet {
                        return IdleOutcome::Idle;
                    }
                    if now >= deadline {
                        tracing::debug!(
                            "Render timeout with {} requests still in flight",
                            in_flight.len()
                        );
                        return IdleOutcome::TimedOut;
                    }
                }
            }
        }
    }
}
