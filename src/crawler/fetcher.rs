//! Content fetcher
//!
//! This module obtains the text of a target, including:
//! - Prefetched content passed straight through
//! - Local `file://` reads
//! - HTTP GET with browser-like headers and manual body decoding
//! - Optional delegation to a rendering backend
//! - Classification of failures for the orchestrator

use crate::config::{FetchConfig, HeaderEntry};
use crate::crawler::decode::{decode_body, ContentEncoding};
use crate::crawler::render::{render_deadline, RenderBackend};
use crate::crawler::task::Target;
use crate::{FetchError, FetchResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";
pub const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.8";
pub const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Error message fragments that identify DNS and connectivity failures
const NETWORK_ERROR_MARKERS: &[&str] = &[
    "dns error",
    "no such host",
    "failed to lookup",
    "name resolution",
    "connection refused",
    "network is unreachable",
    "host is down",
];

/// Per-request settings read by the fetcher
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub insecure: bool,
    pub cookies: Option<String>,
    pub headers: Vec<HeaderEntry>,
    pub render: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            proxy: config.proxy.clone().filter(|p| !p.trim().is_empty()),
            insecure: config.insecure,
            cookies: config.cookies.clone().filter(|c| !c.is_empty()),
            headers: config.headers.clone(),
            render: config.render,
        }
    }
}

impl FetchSettings {
    /// The part of the settings that shapes the HTTP client itself
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            proxy: self.proxy.clone(),
            insecure: self.insecure,
            timeout: self.timeout,
        }
    }
}

/// Key of the client cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub proxy: Option<String>,
    pub insecure: bool,
    pub timeout: Duration,
}

/// Holds one HTTP client and rebuilds it only when its settings change
///
/// `reqwest::Client` is reference counted internally, so handing out clones
/// shares the connection pool and TLS state.
#[derive(Debug, Default)]
pub struct ClientCache {
    slot: Mutex<Option<(ClientSettings, Client)>>,
    builds: AtomicUsize,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a client for `settings`, building one if needed
    pub fn get(&self, settings: &ClientSettings) -> FetchResult<Client> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((cached, client)) = slot.as_ref() {
            if cached == settings {
                return Ok(client.clone());
            }
        }

        let client = build_http_client(settings)?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        *slot = Some((settings.clone(), client.clone()));
        Ok(client)
    }

    /// Number of clients built so far
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

/// Builds an HTTP client for the given settings
///
/// Compression is negotiated through explicit headers and decoded by
/// [`decode_body`], so the client's own decompression stays off.
pub fn build_http_client(settings: &ClientSettings) -> FetchResult<Client> {
    let mut builder = Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout);

    if let Some(proxy) = &settings.proxy {
        let proxy = reqwest::Proxy::all(proxy.as_str())
            .map_err(|e| FetchError::Client(format!("invalid proxy {}: {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    if settings.insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build().map_err(|e| FetchError::Client(e.to_string()))
}

/// Builds the request header set
///
/// Custom headers replace defaults with the same name; invalid names or
/// values are skipped.
pub fn build_headers(settings: &FetchSettings) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );
    headers.insert(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_static(ACCEPT_ENCODING),
    );

    if let Some(cookies) = &settings.cookies {
        match HeaderValue::from_str(cookies) {
            Ok(value) => {
                headers.insert(reqwest::header::COOKIE, value);
            }
            Err(_) => tracing::warn!("Ignoring cookie header with invalid characters"),
        }
    }

    for entry in &settings.headers {
        let name = match HeaderName::from_bytes(entry.name.trim().as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!("Ignoring invalid header name: {}", entry.name);
                continue;
            }
        };
        match HeaderValue::from_str(&entry.value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => tracing::warn!("Ignoring invalid value for header {}", entry.name),
        }
    }

    headers
}

/// Obtains resource content for the orchestrator
pub struct ContentFetcher {
    settings: FetchSettings,
    clients: ClientCache,
    renderer: Option<Arc<dyn RenderBackend>>,
}

impl ContentFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self {
            settings,
            clients: ClientCache::new(),
            renderer: None,
        }
    }

    /// Uses `renderer` for network targets when rendering is enabled
    pub fn with_renderer(mut self, renderer: Arc<dyn RenderBackend>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn client_cache(&self) -> &ClientCache {
        &self.clients
    }

    /// Returns the content of a target
    ///
    /// Prefetched targets are returned as-is, `file://` targets are read
    /// from disk, and everything else goes over the network (or through the
    /// rendering backend when one is configured and enabled).
    pub async fn fetch(&self, target: &Target) -> FetchResult<String> {
        if target.prefetched {
            return Ok(target.content.clone());
        }

        if target.is_local_file() {
            return read_local_file(&target.url).await;
        }

        if self.settings.render {
            if let Some(renderer) = &self.renderer {
                return self.render(renderer.as_ref(), &target.url).await;
            }
        }

        self.fetch_url(&target.url).await
    }

    /// Fetches a URL over HTTP, enforcing the configured timeout
    pub async fn fetch_url(&self, url: &str) -> FetchResult<String> {
        let timeout = self.settings.timeout;
        match tokio::time::timeout(timeout, self.fetch_url_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::deadline(timeout)),
        }
    }

    async fn fetch_url_inner(&self, url: &str) -> FetchResult<String> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        let client = self.clients.get(&self.settings.client_settings())?;

        let response = client
            .get(parsed)
            .headers(build_headers(&self.settings))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        tracing::trace!("{} responded with {}", url, response.status());

        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(ContentEncoding::from_header)
            .unwrap_or(ContentEncoding::Identity);

        let raw = response.bytes().await.map_err(classify_reqwest_error)?;
        let body = decode_body(raw.to_vec(), encoding)?;

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn render(&self, renderer: &dyn RenderBackend, url: &str) -> FetchResult<String> {
        let timeout = render_deadline(self.settings.timeout);
        match tokio::time::timeout(timeout, renderer.render(url, &self.settings)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::deadline(timeout)),
        }
    }
}

/// Reads a `file://` URL from disk
pub async fn read_local_file(url: &str) -> FetchResult<String> {
    let path = Url::parse(url)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|source| FetchError::File {
        path: path.display().to_string(),
        source,
    })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Maps a transport error onto the fetch error taxonomy
pub fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout(err.to_string());
    }

    let chain = error_chain(&err).to_lowercase();
    if NETWORK_ERROR_MARKERS.iter().any(|m| chain.contains(m)) {
        return FetchError::Network(chain);
    }

    FetchError::Http(err)
}

/// Joins an error with all of its sources
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings() -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(2),
            ..FetchSettings::default()
        }
    }

    #[test]
    fn test_default_headers() {
        let headers = build_headers(&settings());
        assert_eq!(headers.get("user-agent").unwrap(), USER_AGENT);
        assert_eq!(headers.get("accept-encoding").unwrap(), ACCEPT_ENCODING);
        assert!(headers.get("cookie").is_none());
    }

    #[test]
    fn test_custom_headers_override_defaults() {
        let mut s = settings();
        s.cookies = Some("session=abc".to_string());
        s.headers = vec![
            HeaderEntry {
                name: "User-Agent".to_string(),
                value: "custom-agent".to_string(),
            },
            HeaderEntry {
                name: "X-Api-Key".to_string(),
                value: "secret".to_string(),
            },
            HeaderEntry {
                name: "bad header".to_string(),
                value: "ignored".to_string(),
            },
        ];

        let headers = build_headers(&s);
        assert_eq!(headers.get("user-agent").unwrap(), "custom-agent");
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert_eq!(headers.get("cookie").unwrap(), "session=abc");
        assert_eq!(headers.get_all("user-agent").iter().count(), 1);
    }

    #[test]
    fn test_client_cache_rebuilds_on_change() {
        let cache = ClientCache::new();
        let mut key = settings().client_settings();

        cache.get(&key).unwrap();
        cache.get(&key).unwrap();
        assert_eq!(cache.builds(), 1);

        key.insecure = true;
        cache.get(&key).unwrap();
        assert_eq!(cache.builds(), 2);

        key.timeout = Duration::from_secs(5);
        cache.get(&key).unwrap();
        cache.get(&key).unwrap();
        assert_eq!(cache.builds(), 3);
    }

    #[test]
    fn test_invalid_proxy_is_client_error() {
        let mut key = settings().client_settings();
        key.proxy = Some("::not a proxy::".to_string());
        let err = build_http_client(&key).unwrap_err();
        assert!(matches!(err, FetchError::Client(_)));
    }

    #[tokio::test]
    async fn test_prefetched_target_is_not_fetched() {
        let fetcher = ContentFetcher::new(settings());
        let target = Target::prefetched("https://unreachable.invalid/app.js", "var a = '/x';");
        assert_eq!(fetcher.fetch(&target).await.unwrap(), "var a = '/x';");
        assert_eq!(fetcher.client_cache().builds(), 0);
    }

    #[tokio::test]
    async fn test_local_file_target() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"fetch('/api/local');").unwrap();
        let url = Url::from_file_path(file.path()).unwrap().to_string();

        let fetcher = ContentFetcher::new(settings());
        let content = fetcher.fetch(&Target::url(url)).await.unwrap();
        assert_eq!(content, "fetch('/api/local');");
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let err = read_local_file("file:///definitely/not/here.js").await.unwrap_err();
        assert!(matches!(err, FetchError::File { .. }));
        assert_eq!(err.kind(), FetchErrorKind::Other);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let fetcher = ContentFetcher::new(settings());
        let err = fetcher.fetch_url("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    /// Sleeps for a fixed time, then returns a fixed document
    struct SlowRenderer {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl RenderBackend for SlowRenderer {
        async fn render(&self, _url: &str, _settings: &FetchSettings) -> FetchResult<String> {
            tokio::time::sleep(self.delay).await;
            Ok("rendered '/api/late'".to_string())
        }
    }

    fn rendering_fetcher(delay: Duration) -> ContentFetcher {
        let mut s = settings();
        s.render = true;
        ContentFetcher::new(s).with_renderer(Arc::new(SlowRenderer { delay }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_may_outlast_request_timeout() {
        // Navigation plus idle wait can legitimately take longer than one timeout
        let fetcher = rendering_fetcher(settings().timeout + Duration::from_secs(1));
        let content = fetcher
            .fetch(&Target::url("https://example.com/"))
            .await
            .unwrap();
        assert_eq!(content, "rendered '/api/late'");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_render_times_out() {
        let fetcher = rendering_fetcher(Duration::from_secs(3600));
        let err = fetcher
            .fetch(&Target::url("https://example.com/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        // Bind then drop a listener to get a port nothing is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fetcher = ContentFetcher::new(settings());
        let err = fetcher
            .fetch_url(&format!("http://127.0.0.1:{}/app.js", port))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Network);
    }
}
