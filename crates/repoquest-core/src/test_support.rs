// Shared test doubles: a scripted HTTP responder and a provider that talks to it
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::models::{Label, Metric, Platform, Repository, SearchPage};
use crate::retry::{Fetcher, RetryConfig};
use crate::search::{validate_page_params, SearchConfig, SearchProvider};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct MockResponse {
    status: u16,
    body: String,
    /// Bytes promised in Content-Length but never sent
    missing: usize,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            missing: 0,
        }
    }

    /// Connection closes before the advertised body length arrives
    pub fn truncated(status: u16, body: impl Into<String>) -> Self {
        Self {
            missing: 64,
            ..Self::status(status, body)
        }
    }
}

/// Answers each incoming request with the next scripted response.
/// Once the script runs out every request gets a 500.
pub(crate) struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Mutex::new(VecDeque::from(responses)));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = tokio::spawn({
            let requests = requests.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let script = script.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let _ = serve_one(stream, script, requests).await;
                    });
                }
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// Request targets (path and query) in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(
    mut stream: TcpStream,
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();

    let response = {
        requests.lock().unwrap().push(target);
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::status(500, "script exhausted"))
    };

    let raw = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len() + response.missing,
        response.body
    );
    stream.write_all(raw.as_bytes()).await?;
    stream.shutdown().await
}

/// An address nothing listens on, for connection-refused scenarios
pub(crate) async fn dead_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}/search", addr)).unwrap()
}

#[derive(Deserialize)]
struct FakePage {
    page: u32,
    count: usize,
    total: Option<u64>,
    has_more: bool,
}

/// Body understood by [`FakeProvider`]: `count` repositories named `p<page>-<i>`
pub(crate) fn page_body(page: u32, count: usize, total: Option<u64>, has_more: bool) -> String {
    serde_json::json!({
        "page": page,
        "count": count,
        "total": total,
        "has_more": has_more,
    })
    .to_string()
}

pub(crate) fn repo(name: &str) -> Repository {
    Repository {
        name: name.to_string(),
        full_name: format!("test/{}", name),
        description: String::new(),
        url: format!("https://example.com/test/{}", name),
        stars: Metric::Known(1),
        forks: Metric::Known(0),
        language: Label::Unknown,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-02T00:00:00Z".to_string(),
        is_private: false,
        is_fork: false,
        is_archived: false,
        topics: Vec::new(),
        license: Label::None,
        open_issues: Metric::Unavailable,
    }
}

pub(crate) struct FakeProvider {
    base: Url,
}

impl FakeProvider {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl SearchProvider for FakeProvider {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url> {
        validate_page_params(page, per_page)?;
        let mut url = self
            .base
            .join("/search")
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        Ok(url)
    }

    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request> {
        Ok(client.get(url.clone()).bearer_auth("test-token").build()?)
    }

    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage> {
        let page: FakePage =
            serde_json::from_slice(body).map_err(|e| Error::ParseError(e.to_string()))?;
        Ok(SearchPage {
            repositories: (0..page.count)
                .map(|i| repo(&format!("p{}-{}", page.page, i)))
                .collect(),
            total_count: Metric::from(page.total),
            has_more: page.has_more,
        })
    }
}

pub(crate) fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 5,
        backoff_multiplier: 2.0,
    }
}

pub(crate) fn fast_fetcher() -> Fetcher {
    Fetcher::new(reqwest::Client::new(), fast_retry())
}

pub(crate) fn fast_search_config() -> SearchConfig {
    SearchConfig {
        page_delay: Duration::from_millis(1),
    }
}
