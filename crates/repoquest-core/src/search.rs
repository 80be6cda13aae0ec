use std::time::Duration;

use futures::future::join_all;
use reqwest::Url;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{Platform, SearchPage, SearchResult};
use crate::retry::{cancellable, Fetcher};
use crate::{Error, Result};

/// What every hosting provider has to supply
///
/// The orchestration in [`Searcher`] only ever talks to providers through
/// these calls, so adding a platform never touches the page loop.
#[cfg_attr(test, mockall::automock)]
pub trait SearchProvider: Send + Sync {
    fn platform(&self) -> Platform;

    /// URL for one page of results. Must be deterministic.
    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url>;

    /// Attach auth and headers. Called again for every retry attempt.
    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request>;

    /// Decode a page body into normalized records plus a pagination hint
    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage>;
}

/// Shared argument check for [`SearchProvider::build_search_url`]
pub fn validate_page_params(page: u32, per_page: u32) -> Result<()> {
    if page == 0 {
        return Err(Error::InvalidArgument("page must be at least 1".into()));
    }
    if per_page == 0 {
        return Err(Error::InvalidArgument("per_page must be greater than 0".into()));
    }
    Ok(())
}

/// Results requested per page. Not configurable.
pub const PER_PAGE: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Pause between pages so we don't burst the provider
    pub page_delay: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(100),
        }
    }
}

enum PageError {
    Fetch(Error),
    Parse(Error),
}

/// Drives pagination for a single provider
pub struct Searcher {
    provider: Box<dyn SearchProvider>,
    fetcher: Fetcher,
    config: SearchConfig,
}

impl Searcher {
    pub fn new(provider: Box<dyn SearchProvider>, fetcher: Fetcher) -> Self {
        Self {
            provider,
            fetcher,
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform(&self) -> Platform {
        self.provider.platform()
    }

    /// Search with a deadline. Whatever was collected before the deadline
    /// is still returned if at least the first page made it.
    pub async fn search_with_timeout(
        &self,
        query: &str,
        max_pages: u32,
        timeout: Duration,
    ) -> Result<SearchResult> {
        let cancel = CancellationToken::new();
        let timer = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                sleep(timeout).await;
                cancel.cancel();
            }
        });

        let outcome = self.search(&cancel, query, max_pages).await;
        timer.abort();
        outcome
    }

    /// Fetch up to `max_pages` pages for `query`.
    ///
    /// Only a failure to get the first page fails the whole search. Once any
    /// records are in hand, later failures stop the loop and the partial
    /// result is returned as success. A body that can't be parsed stops the
    /// loop on any page, the first included.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
        max_pages: u32,
    ) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("query cannot be empty".into()));
        }
        if max_pages == 0 {
            return Err(Error::InvalidArgument(
                "max_pages must be greater than 0".into(),
            ));
        }

        let platform = self.provider.platform();
        let mut result = SearchResult::new(platform, query);

        for page in 1..=max_pages {
            let page_data = match self.fetch_page(cancel, query, page).await {
                Ok(page_data) => page_data,
                Err(PageError::Fetch(err)) if page == 1 => {
                    return Err(Error::FirstPage(Box::new(err)));
                }
                Err(PageError::Fetch(err)) => {
                    warn!(
                        "{}: failed to fetch page {}: {}. Returning partial results.",
                        platform, page, err
                    );
                    break;
                }
                Err(PageError::Parse(err)) => {
                    warn!("{}: failed to parse page {}: {}", platform, page, err);
                    break;
                }
            };

            if page == 1 {
                result.total_count = page_data.total_count;
            }

            let count = page_data.repositories.len();
            result.items.extend(page_data.repositories);
            debug!("{}: page {} returned {} repositories", platform, page, count);

            if !page_data.has_more || count == 0 {
                info!("{}: no more results. Stopping at page {}.", platform, page);
                break;
            }
            if page == max_pages {
                break;
            }

            if cancellable(cancel, sleep(self.config.page_delay)).await.is_err() {
                warn!(
                    "{}: search cancelled after page {}. Returning partial results.",
                    platform, page
                );
                break;
            }
        }

        Ok(result)
    }

    async fn fetch_page(
        &self,
        cancel: &CancellationToken,
        query: &str,
        page: u32,
    ) -> std::result::Result<SearchPage, PageError> {
        let url = self
            .provider
            .build_search_url(query, page, PER_PAGE)
            .map_err(PageError::Fetch)?;

        // Path only: some providers carry credentials in the query string
        info!(
            "Fetching page {} from {}: {}{}",
            page,
            self.provider.platform(),
            url.host_str().unwrap_or_default(),
            url.path()
        );

        let response = self
            .fetcher
            .fetch(self.provider.as_ref(), cancel, &url)
            .await
            .map_err(PageError::Fetch)?;

        let body = match cancellable(cancel, response.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => return Err(PageError::Fetch(err.into())),
            Err(err) => return Err(PageError::Fetch(err)),
        };

        self.provider
            .parse_search_response(&body)
            .map_err(PageError::Parse)
    }
}

/// Runs one [`Searcher`] per provider side by side
///
/// Each provider gets its own outcome; one failing never hides another's
/// results.
#[derive(Default)]
pub struct SearchEngine {
    searchers: Vec<Searcher>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_searcher(&mut self, searcher: Searcher) {
        self.searchers.push(searcher);
    }

    pub fn len(&self) -> usize {
        self.searchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searchers.is_empty()
    }

    pub async fn search_all(
        &self,
        query: &str,
        max_pages: u32,
        timeout: Duration,
    ) -> Vec<(Platform, Result<SearchResult>)> {
        let searches = self.searchers.iter().map(|searcher| async move {
            let outcome = searcher.search_with_timeout(query, max_pages, timeout).await;
            (searcher.platform(), outcome)
        });

        join_all(searches).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metric;
    use crate::test_support::{
        fast_fetcher, fast_search_config, page_body, repo, FakeProvider, MockResponse, MockServer,
    };
    use reqwest::StatusCode;

    fn searcher_for(server: &MockServer) -> Searcher {
        Searcher::new(Box::new(FakeProvider::new(server.base_url())), fast_fetcher())
            .with_config(fast_search_config())
    }

    fn names(result: &SearchResult) -> Vec<String> {
        result.items.iter().map(|r| r.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_two_pages_until_provider_reports_end() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, Some(60), true)),
            MockResponse::ok(page_body(2, 10, Some(60), false)),
            MockResponse::ok(page_body(3, 50, Some(60), true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 2)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 60);
        assert_eq!(result.total_count, Metric::Known(60));
        assert_eq!(result.query, "raft");
        assert_eq!(result.source, Platform::GitHub);
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_records_keep_page_order() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 2, None, true)),
            MockResponse::ok(page_body(2, 2, None, true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 2)
            .await
            .unwrap();

        assert_eq!(names(&result), vec!["p1-0", "p1-1", "p2-0", "p2-1"]);
        let requests = server.requests();
        assert!(requests[0].contains("page=1"));
        assert!(requests[1].contains("page=2"));
        assert_eq!(PER_PAGE, 50);
        assert!(requests[0].contains("per_page=50"));
        assert!(requests[1].contains("per_page=50"));
    }

    #[tokio::test]
    async fn test_never_exceeds_max_pages() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, None, true)),
            MockResponse::ok(page_body(2, 50, None, true)),
            MockResponse::ok(page_body(3, 50, None, true)),
            MockResponse::ok(page_body(4, 50, None, true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 150);
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn test_stops_when_has_more_is_false() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, Some(50), false)),
            MockResponse::ok(page_body(2, 50, Some(50), true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 5)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 50);
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, None, true)),
            MockResponse::ok(page_body(2, 0, None, true)),
            MockResponse::ok(page_body(3, 50, None, true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 5)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 50);
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_total_count_comes_from_first_page() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, Some(120), true)),
            MockResponse::ok(page_body(2, 50, Some(999), true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 2)
            .await
            .unwrap();

        assert_eq!(result.total_count, Metric::Known(120));
    }

    #[tokio::test]
    async fn test_fatal_status_on_first_page_fails() {
        let server = MockServer::start(vec![MockResponse::status(401, "bad token")]).await;

        let err = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FirstPage(_)));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fatal_status_on_later_page_keeps_first_page() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, Some(500), true)),
            MockResponse::status(404, "gone"),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 50);
        assert!(names(&result).iter().all(|n| n.starts_with("p1-")));
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_on_later_page_returns_partial() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, None, true)),
            MockResponse::status(500, "down"),
            MockResponse::status(500, "down"),
            MockResponse::status(500, "down"),
            MockResponse::ok(page_body(2, 50, None, true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 50);
        assert_eq!(server.request_count(), 4);
    }

    #[tokio::test]
    async fn test_parse_failure_on_first_page_is_not_fatal() {
        let server = MockServer::start(vec![MockResponse::ok("<html>nope</html>")]).await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap();

        assert!(result.items.is_empty());
        assert_eq!(result.total_count, Metric::Unavailable);
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_is_never_retried() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 5, None, true)),
            MockResponse::ok("{\"truncated\":"),
            MockResponse::ok(page_body(2, 5, None, true)),
        ])
        .await;

        let result = searcher_for(&server)
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 5);
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_before_any_provider_call() {
        let mut provider = MockSearchProvider::new();
        provider.expect_platform().return_const(Platform::GitLab);
        provider.expect_build_search_url().never();
        provider.expect_build_search_request().never();
        provider.expect_parse_search_response().never();
        let searcher = Searcher::new(Box::new(provider), fast_fetcher());
        let cancel = CancellationToken::new();

        let empty = searcher.search(&cancel, "", 3).await.unwrap_err();
        assert!(matches!(empty, Error::InvalidArgument(_)));

        let blank = searcher.search(&cancel, "   ", 3).await.unwrap_err();
        assert!(matches!(blank, Error::InvalidArgument(_)));

        let no_pages = searcher.search(&cancel, "raft", 0).await.unwrap_err();
        assert!(matches!(no_pages, Error::InvalidArgument(_)));
    }

    fn mock_provider(base: Url, fail_url_on_page: u32) -> MockSearchProvider {
        let mut provider = MockSearchProvider::new();
        provider.expect_platform().return_const(Platform::Gitee);
        provider
            .expect_build_search_url()
            .returning(move |_, page, _| {
                if page == fail_url_on_page {
                    return Err(Error::ConfigError("bad base url".into()));
                }
                let mut url = base.join("/repos").unwrap();
                url.query_pairs_mut().append_pair("page", &page.to_string());
                Ok(url)
            });
        provider
            .expect_build_search_request()
            .returning(|client, url| Ok(client.get(url.clone()).build()?));
        provider
            .expect_parse_search_response()
            .returning(|_| {
                Ok(SearchPage {
                    repositories: vec![repo("a"), repo("b")],
                    total_count: Metric::Known(10),
                    has_more: true,
                })
            });
        provider
    }

    #[tokio::test]
    async fn test_url_failure_on_first_page_fails() {
        let server = MockServer::start(vec![]).await;
        let searcher = Searcher::new(Box::new(mock_provider(server.base_url(), 1)), fast_fetcher())
            .with_config(fast_search_config());

        let err = searcher
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FirstPage(_)));
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn test_url_failure_on_later_page_keeps_partial() {
        let server = MockServer::start(vec![
            MockResponse::ok("{}"),
            MockResponse::ok("{}"),
        ])
        .await;
        let searcher = Searcher::new(Box::new(mock_provider(server.base_url(), 2)), fast_fetcher())
            .with_config(fast_search_config());

        let result = searcher
            .search(&CancellationToken::new(), "raft", 3)
            .await
            .unwrap();

        assert_eq!(result.source, Platform::Gitee);
        assert_eq!(result.items.len(), 2);
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page_fails() {
        let server = MockServer::start(vec![MockResponse::ok(page_body(1, 5, None, true))]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = searcher_for(&server)
            .search(&cancel, "raft", 3)
            .await
            .unwrap_err();

        match err {
            Error::FirstPage(source) => assert!(matches!(*source, Error::Cancelled)),
            other => panic!("expected first page cancellation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_during_later_page_returns_partial() {
        let server = MockServer::start(vec![
            MockResponse::ok(page_body(1, 50, Some(80), true)),
            MockResponse::status(503, "slow down"),
        ])
        .await;
        let fetcher = Fetcher::new(
            reqwest::Client::new(),
            crate::RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 60_000,
                backoff_multiplier: 2.0,
            },
        );
        let searcher = Searcher::new(Box::new(FakeProvider::new(server.base_url())), fetcher)
            .with_config(fast_search_config());

        let started = std::time::Instant::now();
        let result = searcher
            .search_with_timeout("raft", 3, Duration::from_millis(300))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(result.items.len(), 50);
        assert_eq!(result.total_count, Metric::Known(80));
    }

    #[tokio::test]
    async fn test_engine_keeps_outcomes_independent() {
        let healthy = MockServer::start(vec![MockResponse::ok(page_body(1, 3, Some(3), false))]).await;
        let broken = MockServer::start(vec![MockResponse::status(403, "nope")]).await;

        let mut engine = SearchEngine::new();
        engine.add_searcher(searcher_for(&healthy));
        engine.add_searcher(searcher_for(&broken));
        assert_eq!(engine.len(), 2);

        let outcomes = engine
            .search_all("raft", 2, Duration::from_secs(30))
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].1.as_ref().unwrap().items.len(), 3);
        assert!(outcomes[1].1.is_err());
    }

    #[test]
    fn test_page_params_are_validated() {
        assert!(validate_page_params(1, 50).is_ok());
        assert!(validate_page_params(0, 50).is_err());
        assert!(validate_page_params(1, 0).is_err());
    }
}
