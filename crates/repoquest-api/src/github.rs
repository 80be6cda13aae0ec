use repoquest_core::{
    Label, Metric, Platform, Repository, Result, SearchPage, SearchProvider,
};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::common::{decode, search_url, trimmed, with_default_headers};

const GITHUB_API_BASE: &str = "https://api.github.com";

pub struct GitHubProvider {
    token: Option<String>,
    base_url: String,
}

impl GitHubProvider {
    /// Works without a token, just with a much lower rate limit
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, GITHUB_API_BASE.to_string())
    }

    /// For GitHub Enterprise
    pub fn with_base_url(token: Option<String>, base_url: String) -> Self {
        Self { token, base_url }
    }
}

impl SearchProvider for GitHubProvider {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        search_url(
            &self.base_url,
            "/search/repositories",
            page,
            per_page,
            &[
                ("q", query),
                ("page", page_param.as_str()),
                ("per_page", per_page_param.as_str()),
            ],
        )
    }

    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request> {
        let mut request = with_default_headers(client.get(url.clone()), "application/vnd.github.v3+json");

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        Ok(request.build()?)
    }

    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage> {
        let response: SearchResponse = decode(Platform::GitHub, body)?;

        if response.incomplete_results {
            debug!("GitHub reported incomplete results for this page");
        }

        let repositories: Vec<Repository> = response.items.into_iter().map(github_to_repo).collect();

        // Only the item count tells us whether to keep going; the page loop
        // stops on the first empty page.
        Ok(SearchPage {
            has_more: !repositories.is_empty(),
            total_count: Metric::Known(response.total_count),
            repositories,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<GitHubRepo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    pub html_url: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub language: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub open_issues_count: u64,
    pub license: Option<GitHubLicense>,
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLicense {
    pub name: Option<String>,
}

fn github_to_repo(gh: GitHubRepo) -> Repository {
    Repository {
        name: gh.name,
        full_name: gh.full_name,
        description: trimmed(gh.description),
        url: gh.html_url,
        stars: Metric::Known(gh.stargazers_count),
        forks: Metric::Known(gh.forks_count),
        language: Label::language(gh.language),
        created_at: gh.created_at,
        updated_at: gh.updated_at,
        is_private: gh.private,
        is_fork: gh.fork,
        is_archived: gh.archived,
        topics: gh.topics.unwrap_or_default(),
        license: Label::license(gh.license.and_then(|l| l.name)),
        open_issues: Metric::Known(gh.open_issues_count),
    }
}
