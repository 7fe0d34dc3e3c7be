//! Headless Chromium rendering backend (`browser` feature)

use crate::crawler::fetcher::{FetchSettings, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE};
use crate::crawler::render::{IdleOutcome, IdleTracker, NetworkEvent, RenderBackend};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, Headers,
    SetExtraHttpHeadersParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::{mpsc, OnceCell};

const RENDER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Environment variable pointing at a Chromium executable
pub const CHROME_PATH_ENV: &str = "JSRIPPLE_CHROME_PATH";

/// Renders pages in a shared headless Chromium instance
///
/// The browser is launched on first use with the proxy and TLS settings of
/// that first request.
#[derive(Default)]
pub struct ChromiumBackend {
    browser: OnceCell<Browser>,
}

impl ChromiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn browser(&self, settings: &FetchSettings) -> FetchResult<&Browser> {
        self.browser
            .get_or_try_init(|| async {
                let mut builder = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(settings.timeout)
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg("--disable-extensions")
                    .arg("--disable-background-networking")
                    .arg("--disable-popup-blocking");

                if settings.insecure {
                    builder = builder.arg("--ignore-certificate-errors");
                }
                if let Some(proxy) = &settings.proxy {
                    builder = builder.arg(format!("--proxy-server={}", proxy));
                }
                if let Ok(path) = std::env::var(CHROME_PATH_ENV) {
                    if !path.trim().is_empty() {
                        builder = builder.chrome_executable(path.trim());
                    }
                }

                let config = builder.build().map_err(FetchError::Render)?;
                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| FetchError::Render(e.to_string()))?;

                tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });

                tracing::info!("Launched headless browser for rendering");
                Ok(browser)
            })
            .await
    }

    async fn render_page(
        &self,
        page: &Page,
        url: &str,
        settings: &FetchSettings,
    ) -> FetchResult<String> {
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            extra_headers(settings),
        )))
        .await
        .map_err(render_error)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_events(page, tx).await?;

        page.goto(url).await.map_err(render_error)?;

        let tracker = IdleTracker::new(settings.timeout);
        if tracker.wait(&mut rx).await == IdleOutcome::TimedOut {
            tracing::debug!("{} did not reach network idle, using current document", url);
        }

        page.content().await.map_err(render_error)
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    async fn render(&self, url: &str, settings: &FetchSettings) -> FetchResult<String> {
        let browser = self.browser(settings).await?;
        let page = browser.new_page("about:blank").await.map_err(render_error)?;
        let tab = OpenTab::new(page.clone());

        let result = self.render_page(&page, url, settings).await;

        tab.close(url).await;
        result
    }
}

/// Closes a tab when dropped
///
/// A render abandoned by the caller's deadline is dropped mid-await; the tab
/// is then closed on a spawned task.
struct OpenTab {
    page: Option<Page>,
}

impl OpenTab {
    fn new(page: Page) -> Self {
        Self { page: Some(page) }
    }

    async fn close(mut self, url: &str) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close page for {}: {}", url, e);
            }
        }
    }
}

impl Drop for OpenTab {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::debug!("Failed to close abandoned page: {}", e);
                }
            });
        }
    }
}

fn extra_headers(settings: &FetchSettings) -> serde_json::Value {
    let mut headers = serde_json::Map::new();
    headers.insert("User-Agent".into(), RENDER_USER_AGENT.into());
    headers.insert("Accept".into(), ACCEPT.into());
    headers.insert("Accept-Language".into(), ACCEPT_LANGUAGE.into());
    headers.insert("Accept-Encoding".into(), ACCEPT_ENCODING.into());
    if let Some(cookies) = &settings.cookies {
        headers.insert("Cookie".into(), cookies.as_str().into());
    }
    for entry in &settings.headers {
        headers.insert(entry.name.clone(), entry.value.as_str().into());
    }
    serde_json::Value::Object(headers)
}

/// Pipes the page's request lifecycle into the idle tracker
async fn forward_events(page: &Page, tx: mpsc::UnboundedSender<NetworkEvent>) -> FetchResult<()> {
    let mut started = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(render_error)?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(render_error)?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(render_error)?;

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                Some(ev) = started.next() => NetworkEvent::RequestStarted(ev.request_id.inner().clone()),
                Some(ev) = finished.next() => NetworkEvent::RequestFinished(ev.request_id.inner().clone()),
                Some(ev) = failed.next() => NetworkEvent::RequestFailed(ev.request_id.inner().clone()),
                _ = tx.closed() => break,
                else => break,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });

    Ok(())
}

fn render_error(err: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::Render(err.to_string())
}
