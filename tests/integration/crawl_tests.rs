//! End-to-end crawl tests against mock servers

use jsripple::config::Config;
use jsripple::crawler::{CrawlOrchestrator, CrawlOutcome, Target};
use jsripple::output::{OutputHandler, OutputResult, ResourceReport};
use jsripple::{FetchErrorKind, JsRippleError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn recursive_config(max_depth: u32) -> Config {
    let mut config = Config::default();
    config.crawl.recursive = true;
    config.crawl.max_depth = max_depth;
    config.crawl.workers = 4;
    config.fetch.timeout_secs = 5.0;
    config
}

async fn serve(server: &MockServer, route: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn run(config: &Config, targets: Vec<Target>) -> Result<CrawlOutcome, JsRippleError> {
    CrawlOrchestrator::new(config)?.run(targets).await
}

fn resources(outcome: &CrawlOutcome) -> Vec<String> {
    let mut urls: Vec<String> = outcome.reports.iter().map(|r| r.resource.clone()).collect();
    urls.sort();
    urls
}

/// Collects every report passed to the render hook
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl OutputHandler for Recorder {
    fn record(&self, report: &ResourceReport) -> OutputResult<()> {
        self.seen.lock().unwrap().push(report.resource.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_recursive_crawl_stops_at_max_depth() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"<script src="/static/app.js"></script>"#, 1).await;
    serve(&server, "/static/app.js", r#"import("./chunk.js"); fetch("/api/app");"#, 1).await;
    serve(&server, "/static/chunk.js", r#"load("deep.js"); fetch("/api/chunk");"#, 1).await;
    serve(&server, "/static/deep.js", r#"fetch("/api/deep");"#, 0).await;

    let outcome = run(&recursive_config(2), vec![Target::url(format!("{}/", server.uri()))])
        .await
        .unwrap();

    assert_eq!(
        resources(&outcome),
        vec![
            format!("{}/", server.uri()),
            format!("{}/static/app.js", server.uri()),
            format!("{}/static/chunk.js", server.uri()),
        ]
    );
    assert_eq!(outcome.statistics.completed(), 3);
    assert_eq!(outcome.statistics.discovered_tasks, 2);

    let chunk = outcome
        .reports
        .iter()
        .find(|r| r.resource.ends_with("/chunk.js"))
        .unwrap();
    let links: Vec<&str> = chunk.endpoints.iter().map(|e| e.link.as_str()).collect();
    assert_eq!(links, vec!["deep.js", "/api/chunk"]);
}

#[tokio::test]
async fn test_unlimited_depth_follows_whole_chain() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"<script src="/a.js"></script>"#, 1).await;
    serve(&server, "/a.js", r#"x("/b.js")"#, 1).await;
    serve(&server, "/b.js", r#"x("/c.js")"#, 1).await;
    serve(&server, "/c.js", r#"x("/api/end")"#, 1).await;

    let outcome = run(&recursive_config(0), vec![Target::url(format!("{}/", server.uri()))])
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 4);
    assert_eq!(outcome.metadata.total_resources, 4);
}

#[tokio::test]
async fn test_shared_references_are_fetched_once() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"<script src="/app.js"></script><script src="/vendor.js"></script>"#,
        1,
    )
    .await;
    serve(&server, "/app.js", r#"a("/shared.js"); b("/vendor.js"); c("/?v=2");"#, 1).await;
    serve(&server, "/vendor.js", r#"a("/shared.js?cache=1"); b("/app.js#top");"#, 1).await;
    serve(&server, "/shared.js", r#"a("/app.js"); fetch("/api/shared");"#, 1).await;

    let outcome = run(&recursive_config(0), vec![Target::url(format!("{}/", server.uri()))])
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 4);
}

#[tokio::test]
async fn test_scope_limits_followed_hosts() {
    let server = MockServer::start().await;
    let port = server.address().port();
    let page = format!(
        r#"<script src="http://127.0.0.1:{port}/inside.js"></script><script src="http://localhost:{port}/outside.js"></script>"#
    );
    serve(&server, "/", &page, 1).await;
    serve(&server, "/inside.js", r#"fetch("/api/in")"#, 1).await;
    serve(&server, "/outside.js", r#"fetch("/api/out")"#, 0).await;

    let mut config = recursive_config(0);
    config.crawl.scope = Some("127.0.0.1".to_string());

    let outcome = run(&config, vec![Target::url(format!("http://127.0.0.1:{port}/"))])
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 2);
    assert!(outcome.reports.iter().all(|r| r.resource.contains("127.0.0.1")));
}

#[tokio::test]
async fn test_non_recursive_reports_seeds_only() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"<script src="/app.js"></script>"#, 1).await;
    serve(&server, "/app.js", r#"fetch("/api/x")"#, 0).await;

    let mut config = recursive_config(0);
    config.crawl.recursive = false;

    let outcome = run(&config, vec![Target::url(format!("{}/", server.uri()))])
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].endpoints[0].link, "/app.js");
    assert_eq!(outcome.statistics.discovered_tasks, 0);
}

#[tokio::test]
async fn test_filter_applies_to_reports() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"var a = "/api/users"; var b = "/static/logo.png"; var c = "/api/posts";"#,
        1,
    )
    .await;

    let mut config = recursive_config(0);
    config.extract.regex = Some("^/api/".to_string());

    let outcome = run(&config, vec![Target::url(format!("{}/", server.uri()))])
        .await
        .unwrap();

    let links: Vec<&str> = outcome.reports[0]
        .endpoints
        .iter()
        .map(|e| e.link.as_str())
        .collect();
    assert_eq!(links, vec!["/api/users", "/api/posts"]);
}

#[tokio::test]
async fn test_discovered_failure_is_skipped() {
    let server = MockServer::start().await;
    let page = r#"<script src="ftp://127.0.0.1:1/legacy.js"></script><script src="/missing.js"></script>"#;
    serve(&server, "/", page, 1).await;
    Mock::given(method("GET"))
        .and(path("/missing.js"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = run(&recursive_config(0), vec![Target::url(format!("{}/", server.uri()))])
        .await
        .unwrap();

    // The 404 body is still content; the ftp resource cannot be fetched
    assert_eq!(outcome.reports.len(), 2);
    assert_eq!(outcome.statistics.failed(), 1);
}

#[tokio::test]
async fn test_seed_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let missing = url::Url::from_file_path(dir.path().join("gone.js"))
        .unwrap()
        .to_string();

    let err = run(&recursive_config(0), vec![Target::url(missing)])
        .await
        .unwrap_err();

    match err {
        JsRippleError::Fetch { source, .. } => assert_eq!(source.kind(), FetchErrorKind::Other),
        other => panic!("unexpected error: {other}"),
    }
}

fn missing_file_url(dir: &TempDir, name: &str) -> String {
    url::Url::from_file_path(dir.path().join(name))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_seed_failure_cancels_queued_seeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"fetch("/api/x")"#))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut targets = vec![Target::url(missing_file_url(&dir, "gone.js"))];
    targets.extend((0..4).map(|i| Target::url(format!("{}/page/{}", server.uri(), i))));

    let mut config = recursive_config(0);
    config.crawl.workers = 1;

    let err = run(&config, targets).await.unwrap_err();
    assert!(matches!(err, JsRippleError::Fetch { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_seed_failure_wins() {
    let dir = TempDir::new().unwrap();
    let first = missing_file_url(&dir, "first.js");
    let second = missing_file_url(&dir, "second.js");

    let mut config = recursive_config(0);
    config.crawl.workers = 1;

    let err = run(&config, vec![Target::url(first.clone()), Target::url(second)])
        .await
        .unwrap_err();

    match err {
        JsRippleError::Fetch { url, .. } => assert_eq!(url, first),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_seed_is_skipped() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"fetch("/api/alive")"#, 1).await;

    // Nothing listens on port 1
    let targets = vec![
        Target::url("http://127.0.0.1:1/app.js"),
        Target::url(format!("{}/", server.uri())),
    ];

    let outcome = run(&recursive_config(0), targets).await.unwrap();

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.statistics.failed(), 1);
}

/// Records when each request arrived and answers after a fixed delay
struct DelayedArrivals {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for DelayedArrivals {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_string(r#"fetch("/api/slow")"#)
            .set_delay(self.delay)
    }
}

/// Largest number of requests whose delay windows overlap
fn peak_in_flight(arrivals: &[Instant], delay: Duration) -> usize {
    arrivals
        .iter()
        .map(|start| {
            arrivals
                .iter()
                .filter(|other| **other >= *start && **other < *start + delay)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_seeds_are_fetched_concurrently() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(400);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .respond_with(DelayedArrivals {
            delay,
            arrivals: Arc::clone(&arrivals),
        })
        .expect(8)
        .mount(&server)
        .await;

    let mut config = recursive_config(0);
    config.crawl.recursive = false;
    config.crawl.workers = 8;

    let targets = (0..8)
        .map(|i| Target::url(format!("{}/page/{}", server.uri(), i)))
        .collect();

    let outcome = run(&config, targets).await.unwrap();
    assert_eq!(outcome.reports.len(), 8);

    let arrivals = arrivals.lock().unwrap();
    let peak = peak_in_flight(&arrivals, delay);
    assert!(peak > 1, "at most {} request in flight", peak);
}

#[tokio::test]
async fn test_local_and_prefetched_targets() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("bundle.js");
    std::fs::write(&script, "const u = \"/api/local\";\nconst v = './lazy.js';").unwrap();
    std::fs::write(dir.path().join("lazy.js"), "fetch('/api/lazy');").unwrap();
    let file_url = url::Url::from_file_path(&script).unwrap().to_string();

    let targets = vec![
        Target::url(file_url.clone()),
        Target::prefetched("https://example.com/captured", r#"x("/api/captured")"#),
    ];

    let outcome = run(&recursive_config(0), targets).await.unwrap();

    let mut found: Vec<String> = outcome
        .reports
        .iter()
        .flat_map(|r| r.endpoints.iter().map(|e| e.link.clone()))
        .collect();
    found.sort();
    assert_eq!(found, vec!["./lazy.js", "/api/captured", "/api/lazy", "/api/local"]);
    assert!(outcome.reports.iter().any(|r| r.resource == file_url));
}

#[tokio::test]
async fn test_context_and_render_hook() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/app.js",
        r#"function load(){return fetch("/api/users");}var cfg={url:"/api/config"};"#,
        1,
    )
    .await;

    let mut config = recursive_config(0);
    config.extract.context = true;

    let recorder = Arc::new(Recorder::default());
    let outcome = CrawlOrchestrator::new(&config)
        .unwrap()
        .with_handler(recorder.clone())
        .run(vec![Target::url(format!("{}/app.js", server.uri()))])
        .await
        .unwrap();

    let report = &outcome.reports[0];
    assert_eq!(report.endpoints.len(), 2);
    assert_eq!(report.endpoints[0].line, 2);
    assert!(report.endpoints[0].context.contains("return fetch(\"/api/users\")"));
    assert!(report.endpoints[1].context.contains("/api/config"));

    assert_eq!(*recorder.seen.lock().unwrap(), vec![report.resource.clone()]);
}

#[tokio::test]
async fn test_run_without_targets() {
    let outcome = run(&recursive_config(0), Vec::new()).await.unwrap();
    assert!(outcome.reports.is_empty());
    assert_eq!(outcome.statistics.total_tasks, 0);
}
