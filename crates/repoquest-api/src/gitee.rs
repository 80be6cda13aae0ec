use repoquest_core::{
    Label, Metric, Platform, Repository, Result, SearchPage, SearchProvider,
};
use reqwest::Url;
use serde::Deserialize;

use crate::common::{decode, search_url, trimmed, with_default_headers};

const GITEE_API_BASE: &str = "https://gitee.com/api/v5";

pub struct GiteeProvider {
    token: Option<String>,
    base_url: String,
}

impl GiteeProvider {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, GITEE_API_BASE.to_string())
    }

    pub fn with_base_url(token: Option<String>, base_url: String) -> Self {
        Self { token, base_url }
    }
}

impl SearchProvider for GiteeProvider {
    fn platform(&self) -> Platform {
        Platform::Gitee
    }

    /// Gitee takes the token as an `access_token` query parameter
    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let mut params = vec![
            ("q", query),
            ("page", page_param.as_str()),
            ("per_page", per_page_param.as_str()),
        ];
        if let Some(ref token) = self.token {
            params.push(("access_token", token.as_str()));
        }

        search_url(&self.base_url, "/search/repositories", page, per_page, &params)
    }

    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request> {
        Ok(with_default_headers(client.get(url.clone()), "application/json").build()?)
    }

    /// Gitee sends the total in a `Total-Count` header only, so it stays
    /// unavailable here.
    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage> {
        let repos: Vec<GiteeRepo> = decode(Platform::Gitee, body)?;
        let repositories: Vec<Repository> = repos.into_iter().map(gitee_to_repo).collect();

        Ok(SearchPage {
            has_more: !repositories.is_empty(),
            total_count: Metric::Unavailable,
            repositories,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiteeRepo {
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
    /// Plain string, unlike GitHub's license object
    pub license: Option<String>,
    pub topics: Option<Vec<String>>,
}

fn gitee_to_repo(ge: GiteeRepo) -> Repository {
    Repository {
        name: ge.name,
        full_name: ge.full_name,
        description: trimmed(ge.description),
        url: ge.html_url,
        stars: Metric::Known(ge.stargazers_count),
        forks: Metric::Known(ge.forks_count),
        language: Label::language(ge.language),
        created_at: ge.created_at,
        updated_at: ge.updated_at,
        is_private: ge.private,
        is_fork: ge.fork,
        is_archived: ge.archived,
        topics: ge.topics.unwrap_or_default(),
        license: Label::license(ge.license),
        open_issues: Metric::Known(ge.open_issues_count),
    }
}
