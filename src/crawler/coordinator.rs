//! Crawl orchestrator - worker pool and per-task state machine
//!
//! This module coordinates all aspects of a run, including:
//! - Seeding one task per target
//! - Running a fixed pool of workers over the shared task queue
//! - Fetching, extracting and reporting each resource
//! - Expanding script and sitemap references in recursive mode
//! - Applying the failure policy and fail-fast cancellation

use crate::config::Config;
use crate::crawler::fetcher::{ContentFetcher, FetchSettings};
use crate::crawler::scheduler::TaskQueue;
use crate::crawler::task::{Depth, ResourceTask, Target};
use crate::extract::{endpoint_regex, find_endpoints, Endpoint};
use crate::output::{CrawlStatistics, Metadata, OutputHandler, ResourceReport};
use crate::state::TaskState;
use crate::url::{within_scope, ResourceResolver, ResourceType};
use crate::{FetchError, FetchErrorKind, JsRippleError};
use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Resource types followed during recursive discovery
const FOLLOWED_TYPES: &[ResourceType] = &[ResourceType::JavaScript, ResourceType::Sitemap];

/// Result of a completed run
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Reports in completion order, which varies between runs
    pub reports: Vec<ResourceReport>,
    pub metadata: Metadata,
    pub statistics: CrawlStatistics,
}

/// Decides which discovered references become new tasks
#[derive(Debug, Clone)]
pub struct Expansion {
    resolver: ResourceResolver,
    scope: Option<String>,
    include_subdomains: bool,
}

impl Expansion {
    pub fn new(resolver: ResourceResolver, scope: Option<String>, include_subdomains: bool) -> Self {
        Self {
            resolver,
            scope: scope.filter(|s| !s.trim().is_empty()),
            include_subdomains,
        }
    }

    /// Builds child tasks for the endpoints found in `task`
    ///
    /// Returns nothing when the task is not recursive or its depth is
    /// exhausted. Each child is resolved against the task's own URL, must be
    /// a script or sitemap, must be in scope, and must be new to the seed's
    /// visited set.
    pub fn expand(&self, task: &ResourceTask, endpoints: &[Endpoint]) -> Vec<ResourceTask> {
        let Some(visited) = task.visited.as_ref() else {
            return Vec::new();
        };
        let Some(child_depth) = task.depth.child() else {
            return Vec::new();
        };

        let mut children = Vec::new();
        for endpoint in endpoints {
            let Some((url, resource_type)) =
                self.resolver.resolve(&endpoint.link, task.url(), FOLLOWED_TYPES)
            else {
                continue;
            };

            if let Some(scope) = &self.scope {
                if !within_scope(&url, scope, self.include_subdomains) {
                    tracing::trace!("Out of scope: {}", url);
                    continue;
                }
            }

            if !visited.add(&url) {
                continue;
            }

            tracing::debug!("Discovered {} {} (depth {})", resource_type, url, child_depth);
            children.push(task.child(url, resource_type, child_depth));
        }

        children
    }
}

/// Everything a worker needs that does not change during a run
struct Engine {
    fetcher: ContentFetcher,
    expansion: Expansion,
    filter: Option<Regex>,
    include_context: bool,
    recursive: bool,
    depth: Depth,
    workers: usize,
}

/// State shared by the workers of a single run
struct RunState {
    queue: Arc<TaskQueue>,
    cancel: CancellationToken,
    reports: Mutex<Vec<ResourceReport>>,
    // Held while invoking the render hook so output blocks stay whole
    handlers: Mutex<Vec<Arc<dyn OutputHandler>>>,
    fatal: Mutex<Option<JsRippleError>>,
    statistics: Mutex<CrawlStatistics>,
}

impl RunState {
    /// Stores the first fatal error and cancels the run; later ones are dropped
    fn fail(&self, err: JsRippleError) {
        let mut fatal = lock(&self.fatal);
        if fatal.is_none() {
            tracing::error!("Aborting run: {}", err);
            *fatal = Some(err);
            self.cancel.cancel();
        } else {
            tracing::debug!("Ignoring subsequent fatal error: {}", err);
        }
    }
}

/// Runs crawls over a fixed-size worker pool
pub struct CrawlOrchestrator {
    engine: Arc<Engine>,
    handlers: Vec<Arc<dyn OutputHandler>>,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator from validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to run
    /// * `Err(JsRippleError)` - The filter expression is invalid, or
    ///   rendering was requested without browser support
    pub fn new(config: &Config) -> Result<Self, JsRippleError> {
        let fetcher = ContentFetcher::new(FetchSettings::from(&config.fetch));
        let fetcher = attach_renderer(fetcher, config.fetch.render)?;
        Self::with_fetcher(config, fetcher)
    }

    /// Creates an orchestrator around an existing fetcher
    pub fn with_fetcher(config: &Config, fetcher: ContentFetcher) -> Result<Self, JsRippleError> {
        let filter = config.extract.compile_filter()?;
        let resolver =
            ResourceResolver::new(&config.crawl.script_extensions, &config.crawl.denylist);

        let engine = Engine {
            fetcher,
            expansion: Expansion::new(
                resolver,
                config.crawl.scope.clone(),
                config.crawl.scope_include_subdomains,
            ),
            filter,
            include_context: config.extract.context,
            recursive: config.crawl.recursive,
            depth: config.crawl.depth(),
            workers: config.crawl.workers.max(1),
        };

        Ok(Self {
            engine: Arc::new(engine),
            handlers: Vec::new(),
        })
    }

    /// Registers a render hook called once per completed resource
    pub fn with_handler(mut self, handler: Arc<dyn OutputHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Crawls the given seed targets until every task has finished
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - Reports in completion order plus totals
    /// * `Err(JsRippleError)` - The first fatal failure, after the workers drained
    pub async fn run(&self, targets: Vec<Target>) -> Result<CrawlOutcome, JsRippleError> {
        let engine = &self.engine;
        let cancel = CancellationToken::new();
        let queue = TaskQueue::new(engine.workers, cancel.clone());

        let run = Arc::new(RunState {
            queue: Arc::clone(&queue),
            cancel,
            reports: Mutex::new(Vec::new()),
            handlers: Mutex::new(self.handlers.clone()),
            fatal: Mutex::new(None),
            statistics: Mutex::new(CrawlStatistics::new()),
        });

        tracing::info!(
            "Starting crawl of {} targets with {} workers (recursive: {}, depth: {})",
            targets.len(),
            engine.workers,
            engine.recursive,
            engine.depth
        );

        if targets.is_empty() {
            queue.close();
        }

        // Seeds go in before any worker starts so the pending count cannot
        // reach zero while seeding
        for target in targets {
            let task = ResourceTask::seed(target, engine.recursive, engine.depth);
            tracing::debug!("Queued seed {}", task.url());
            queue.submit(task);
        }

        let handles: Vec<_> = (0..engine.workers)
            .map(|id| tokio::spawn(worker(id, Arc::clone(engine), Arc::clone(&run))))
            .collect();

        for handle in handles {
            handle.await?;
        }

        tracing::debug!("All workers exited");

        if let Some(err) = lock(&run.fatal).take() {
            return Err(err);
        }

        let reports = std::mem::take(&mut *lock(&run.reports));
        let statistics = lock(&run.statistics).clone();
        let metadata = Metadata::from_reports(&reports, chrono::Utc::now());

        tracing::info!(
            "Crawl finished: {} resources, {} endpoints",
            metadata.total_resources,
            metadata.total_endpoints
        );

        Ok(CrawlOutcome {
            reports,
            metadata,
            statistics,
        })
    }
}

#[cfg(feature = "browser")]
fn attach_renderer(fetcher: ContentFetcher, render: bool) -> Result<ContentFetcher, JsRippleError> {
    if !render {
        return Ok(fetcher);
    }
    Ok(fetcher.with_renderer(Arc::new(crate::crawler::chromium::ChromiumBackend::new())))
}

#[cfg(not(feature = "browser"))]
fn attach_renderer(fetcher: ContentFetcher, render: bool) -> Result<ContentFetcher, JsRippleError> {
    if render {
        return Err(crate::ConfigError::Validation(
            "rendering requires jsripple to be built with the `browser` feature".to_string(),
        )
        .into());
    }
    Ok(fetcher)
}

async fn worker(id: usize, engine: Arc<Engine>, run: Arc<RunState>) {
    tracing::trace!("Worker {} started", id);

    while let Some(task) = run.queue.next().await {
        let url = task.url().to_string();
        let state = if run.queue.is_cancelled() {
            tracing::debug!("Discarding {} after cancellation", url);
            advance(&url, TaskState::Queued, TaskState::Cancelled)
        } else {
            let running = advance(&url, TaskState::Queued, TaskState::Running);
            let finished = process(&engine, &run, task).await;
            advance(&url, running, finished)
        };

        lock(&run.statistics).record(state);
        run.queue.task_done();
    }

    tracing::trace!("Worker {} exiting", id);
}

/// Moves a task between states, logging transitions the lifecycle forbids
fn advance(url: &str, from: TaskState, to: TaskState) -> TaskState {
    if !from.can_transition_to(to) {
        tracing::warn!("Unexpected transition for {}: {} -> {}", url, from, to);
    }
    tracing::trace!("{}: {} -> {}", url, from, to);
    to
}

/// Runs one task from `Running` to a terminal state
async fn process(engine: &Arc<Engine>, run: &RunState, task: ResourceTask) -> TaskState {
    tracing::debug!("Processing {} ({})", task.url(), TaskState::Running);

    let content = match engine.fetcher.fetch(&task.target).await {
        Ok(content) => content,
        Err(err) => return handle_fetch_error(run, &task, err),
    };

    let extracting = Arc::clone(engine);
    let endpoints = match tokio::task::spawn_blocking(move || {
        find_endpoints(
            &content,
            endpoint_regex(),
            extracting.include_context,
            extracting.filter.as_ref(),
            true,
        )
    })
    .await
    {
        Ok(endpoints) => endpoints,
        Err(err) => {
            tracing::error!("Extraction failed for {}: {}", task.url(), err);
            return TaskState::Failed(FetchErrorKind::Other);
        }
    };

    let report = ResourceReport::new(task.url(), endpoints);
    lock(&run.reports).push(report.clone());

    let children = if task.is_recursive() && task.depth.can_expand() {
        engine.expansion.expand(&task, &report.endpoints)
    } else {
        Vec::new()
    };
    if !children.is_empty() {
        lock(&run.statistics).discovered_tasks += children.len() as u64;
    }
    for child in children {
        run.queue.submit(child);
    }

    {
        let handlers = lock(&run.handlers);
        for handler in handlers.iter() {
            if let Err(err) = handler.record(&report) {
                tracing::warn!("Output handler failed for {}: {}", report.resource, err);
            }
        }
    }

    tracing::debug!(
        "{} {} with {} endpoints",
        TaskState::Completed,
        task.url(),
        report.endpoint_count()
    );
    TaskState::Completed
}

/// Applies the failure policy
///
/// Timeouts and unreachable hosts are skipped. Any other failure is fatal
/// for a seed and skipped for a discovered resource.
fn handle_fetch_error(run: &RunState, task: &ResourceTask, err: FetchError) -> TaskState {
    let kind = err.kind();
    match kind {
        FetchErrorKind::Timeout => {
            tracing::info!("Skipping {}: timed out ({})", task.url(), err);
        }
        FetchErrorKind::Network => {
            tracing::info!("Skipping {}: host unreachable ({})", task.url(), err);
        }
        FetchErrorKind::Other if task.is_seed() => {
            run.fail(JsRippleError::Fetch {
                url: task.url().to_string(),
                source: err,
            });
        }
        FetchErrorKind::Other => {
            tracing::info!("Skipping {}: {}", task.url(), err);
        }
    }
    TaskState::Failed(kind)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;

    fn endpoint(link: &str) -> Endpoint {
        Endpoint {
            link: link.to_string(),
            context: String::new(),
            line: 1,
        }
    }

    fn expansion(scope: Option<&str>, include_subdomains: bool) -> Expansion {
        Expansion::new(
            ResourceResolver::default(),
            scope.map(str::to_string),
            include_subdomains,
        )
    }

    fn seed(depth: Depth) -> ResourceTask {
        ResourceTask::seed(Target::url("https://example.com/app/index.html"), true, depth)
    }

    #[test]
    fn test_advance_follows_lifecycle() {
        let url = "https://example.com/";
        let running = advance(url, TaskState::Queued, TaskState::Running);
        assert_eq!(running, TaskState::Running);
        assert_eq!(
            advance(url, running, TaskState::Failed(FetchErrorKind::Timeout)),
            TaskState::Failed(FetchErrorKind::Timeout)
        );
        assert_eq!(
            advance(url, TaskState::Queued, TaskState::Cancelled),
            TaskState::Cancelled
        );
    }

    #[test]
    fn test_max_depth_one() {
        let rules = expansion(None, false);
        let seed = seed(Depth::from_max_depth(1));

        let children = rules.expand(&seed, &[endpoint("/static/main.js"), endpoint("vendor.js")]);
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.depth == Depth::Remaining(0)));
        assert_eq!(children[1].url(), "https://example.com/app/vendor.js");

        let grandchildren = rules.expand(&children[0], &[endpoint("/static/chunk.js")]);
        assert!(grandchildren.is_empty());
    }

    #[test]
    fn test_unlimited_depth_keeps_expanding() {
        let rules = expansion(None, false);
        let seed = seed(Depth::Unlimited);

        let children = rules.expand(&seed, &[endpoint("/a.js")]);
        let grandchildren = rules.expand(&children[0], &[endpoint("/b.js")]);
        assert_eq!(grandchildren.len(), 1);
        assert_eq!(grandchildren[0].depth, Depth::Unlimited);
    }

    #[test]
    fn test_visited_urls_are_not_requeued() {
        let rules = expansion(None, false);
        let seed = seed(Depth::Unlimited);

        let first = rules.expand(&seed, &[endpoint("/a.js?v=1"), endpoint("/a.js?v=2")]);
        assert_eq!(first.len(), 1);

        let second = rules.expand(&first[0], &[endpoint("/a.js"), endpoint("/b.js")]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].url(), "https://example.com/b.js");
    }

    #[test]
    fn test_only_scripts_and_sitemaps_followed() {
        let rules = expansion(None, false);
        let children = rules.expand(
            &seed(Depth::Unlimited),
            &[
                endpoint("/api/users"),
                endpoint("/styles.css"),
                endpoint("/sitemap.xml"),
                endpoint("/node_modules/x.js"),
            ],
        );
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].resource_type, Some(ResourceType::Sitemap));
    }

    #[test]
    fn test_scope_filtering() {
        let links = [
            endpoint("https://cdn.example.com/x.js"),
            endpoint("https://badexample.com/x.js"),
            endpoint("/local.js"),
        ];

        let strict = expansion(Some("example.com"), false).expand(&seed(Depth::Unlimited), &links);
        let urls: Vec<&str> = strict.iter().map(|c| c.url()).collect();
        assert_eq!(urls, vec!["https://example.com/local.js"]);

        let loose = expansion(Some("example.com"), true).expand(&seed(Depth::Unlimited), &links);
        let urls: Vec<&str> = loose.iter().map(|c| c.url()).collect();
        assert_eq!(
            urls,
            vec!["https://cdn.example.com/x.js", "https://example.com/local.js"]
        );
    }

    #[test]
    fn test_non_recursive_task_never_expands() {
        let rules = expansion(None, false);
        let task = ResourceTask::seed(Target::url("https://example.com/"), false, Depth::Unlimited);
        assert!(rules.expand(&task, &[endpoint("/a.js")]).is_empty());
    }

    #[tokio::test]
    async fn test_prefetched_seeds_without_network() {
        let config = Config::default();
        let orchestrator = CrawlOrchestrator::new(&config).unwrap();

        let outcome = orchestrator
            .run(vec![
                Target::prefetched("https://example.com/a", "fetch('/api/a'); fetch('/api/b');"),
                Target::prefetched("https://example.com/b", "nothing here"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.metadata.total_resources, 2);
        assert_eq!(outcome.metadata.total_endpoints, 2);
        assert_eq!(outcome.statistics.completed(), 2);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let orchestrator = CrawlOrchestrator::new(&Config::default()).unwrap();
        let outcome = orchestrator.run(Vec::new()).await.unwrap();
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.statistics.total_tasks, 0);
    }

    #[tokio::test]
    async fn test_missing_seed_file_is_fatal() {
        let orchestrator = CrawlOrchestrator::new(&Config::default()).unwrap();
        let err = orchestrator
            .run(vec![Target::url("file:///definitely/not/here.js")])
            .await
            .unwrap_err();
        assert!(matches!(err, JsRippleError::Fetch { .. }));
    }

    #[test]
    fn test_invalid_filter_rejected_up_front() {
        let mut config = Config::default();
        config.extract.regex = Some("(".to_string());
        assert!(matches!(
            CrawlOrchestrator::new(&config),
            Err(JsRippleError::Config(ConfigError::InvalidPattern(_)))
        ));
    }
}
