//! Fetcher behaviour against a live mock server

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use jsripple::config::HeaderEntry;
use jsripple::crawler::{ContentFetcher, FetchSettings, Target};
use jsripple::FetchErrorKind;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCRIPT: &str = "fetch('/api/v1/users'); const next = \"/api/v1/posts\";\n";

fn fetcher(timeout: Duration) -> ContentFetcher {
    ContentFetcher::new(FetchSettings {
        timeout,
        ..FetchSettings::default()
    })
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn serve_encoded(server: &MockServer, route: &str, encoding: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", encoding)
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let server = MockServer::start().await;
    serve_encoded(&server, "/app.js", "gzip", gzip(SCRIPT.as_bytes())).await;

    let content = fetcher(Duration::from_secs(5))
        .fetch_url(&format!("{}/app.js", server.uri()))
        .await
        .unwrap();

    assert_eq!(content, SCRIPT);
}

#[tokio::test]
async fn test_truncated_gzip_yields_partial_content() {
    let server = MockServer::start().await;
    let full = SCRIPT.repeat(100);
    let compressed = gzip(full.as_bytes());
    let truncated = compressed[..compressed.len() - 12].to_vec();
    serve_encoded(&server, "/broken.js", "gzip", truncated).await;

    let content = fetcher(Duration::from_secs(5))
        .fetch_url(&format!("{}/broken.js", server.uri()))
        .await
        .unwrap();

    assert!(!content.is_empty());
    assert!(full.starts_with(&content));
}

#[tokio::test]
async fn test_deflate_and_brotli() {
    let server = MockServer::start().await;

    let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
    zlib.write_all(SCRIPT.as_bytes()).unwrap();
    serve_encoded(&server, "/deflate.js", "deflate", zlib.finish().unwrap()).await;

    let mut br = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut br, 4096, 5, 22);
        writer.write_all(SCRIPT.as_bytes()).unwrap();
    }
    serve_encoded(&server, "/brotli.js", "br, gzip", br).await;

    let fetcher = fetcher(Duration::from_secs(5));
    let deflated = fetcher
        .fetch_url(&format!("{}/deflate.js", server.uri()))
        .await
        .unwrap();
    let brotli = fetcher
        .fetch_url(&format!("{}/brotli.js", server.uri()))
        .await
        .unwrap();

    assert_eq!(deflated, SCRIPT);
    assert_eq!(brotli, SCRIPT);
    assert_eq!(fetcher.client_cache().builds(), 1);
}

#[tokio::test]
async fn test_headers_and_cookie_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.js"))
        .and(header_exists("user-agent"))
        .and(header_exists("accept-encoding"))
        .and(header("cookie", "session=abc"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("var ok = '/api/private';"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ContentFetcher::new(FetchSettings {
        timeout: Duration::from_secs(5),
        cookies: Some("session=abc".to_string()),
        headers: vec![HeaderEntry {
            name: "X-Api-Key".to_string(),
            value: "secret".to_string(),
        }],
        ..FetchSettings::default()
    });

    let content = fetcher
        .fetch(&Target::url(format!("{}/private.js", server.uri())))
        .await
        .unwrap();
    assert_eq!(content, "var ok = '/api/private';");
}

#[tokio::test]
async fn test_error_status_still_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.js"))
        .respond_with(ResponseTemplate::new(404).set_body_string("var notFound = '/404/page';"))
        .mount(&server)
        .await;

    let content = fetcher(Duration::from_secs(5))
        .fetch_url(&format!("{}/missing.js", server.uri()))
        .await
        .unwrap();
    assert!(content.contains("/404/page"));
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = fetcher(Duration::from_millis(500))
        .fetch_url(&format!("{}/slow.js", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Timeout);
}
