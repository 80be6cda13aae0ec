use repoquest_core::{
    Label, Metric, Platform, Repository, Result, SearchPage, SearchProvider,
};
use reqwest::Url;
use serde::Deserialize;

use crate::common::{decode, search_url, trimmed, with_default_headers};

const GITCODE_API_BASE: &str = "https://api.gitcode.com/api/v5";

pub struct GitCodeProvider {
    token: Option<String>,
    base_url: String,
    language: Option<String>,
}

impl GitCodeProvider {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, GITCODE_API_BASE.to_string())
    }

    pub fn with_base_url(token: Option<String>, base_url: String) -> Self {
        Self {
            token,
            base_url,
            language: None,
        }
    }

    /// Restrict results to one programming language
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }
}

impl SearchProvider for GitCodeProvider {
    fn platform(&self) -> Platform {
        Platform::GitCode
    }

    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let mut params = vec![
            ("q", query),
            ("page", page_param.as_str()),
            ("per_page", per_page_param.as_str()),
        ];
        if let Some(ref language) = self.language {
            params.push(("language", language.as_str()));
        }

        search_url(&self.base_url, "/search/repositories", page, per_page, &params)
    }

    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request> {
        let mut request = with_default_headers(client.get(url.clone()), "application/json");

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        Ok(request.build()?)
    }

    /// Bare array, no totals anywhere
    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage> {
        let repos: Vec<GitCodeRepo> = decode(Platform::GitCode, body)?;
        let repositories: Vec<Repository> = repos.into_iter().map(gitcode_to_repo).collect();

        Ok(SearchPage {
            has_more: !repositories.is_empty(),
            total_count: Metric::Unavailable,
            repositories,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCodeRepo {
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
    pub license: Option<GitCodeLicense>,
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCodeLicense {
    pub name: Option<String>,
}

fn gitcode_to_repo(gc: GitCodeRepo) -> Repository {
    Repository {
        name: gc.name,
        full_name: gc.full_name,
        description: trimmed(gc.description),
        url: gc.html_url,
        stars: Metric::Known(gc.stargazers_count),
        forks: Metric::Known(gc.forks_count),
        language: Label::language(gc.language),
        created_at: gc.created_at,
        updated_at: gc.updated_at,
        is_private: gc.private,
        is_fork: gc.fork,
        is_archived: gc.archived,
        topics: gc.topics.unwrap_or_default(),
        license: Label::license(gc.license.and_then(|l| l.name)),
        open_issues: Metric::Known(gc.open_issues_count),
    }
}
