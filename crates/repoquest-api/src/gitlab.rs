use repoquest_core::{
    Label, Metric, Platform, Repository, Result, SearchPage, SearchProvider,
};
use reqwest::Url;
use serde::Deserialize;

use crate::common::{decode, search_url, trimmed, with_default_headers};

const GITLAB_API_BASE: &str = "https://gitlab.com/api/v4";

pub struct GitLabProvider {
    token: Option<String>,
    base_url: String,
}

impl GitLabProvider {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, GITLAB_API_BASE.to_string())
    }

    /// For self-hosted GitLab instances
    pub fn with_base_url(token: Option<String>, base_url: String) -> Self {
        Self { token, base_url }
    }
}

impl SearchProvider for GitLabProvider {
    fn platform(&self) -> Platform {
        Platform::GitLab
    }

    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        search_url(
            &self.base_url,
            "/projects",
            page,
            per_page,
            &[
                ("search", query),
                ("page", page_param.as_str()),
                ("per_page", per_page_param.as_str()),
            ],
        )
    }

    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request> {
        let mut request = with_default_headers(client.get(url.clone()), "application/json");

        // Public projects don't need a token
        if let Some(ref token) = self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }

        Ok(request.build()?)
    }

    /// GitLab answers with a bare array. Totals and next-page markers live
    /// in response headers, which adapters never see.
    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage> {
        let projects: Vec<GitLabProject> = decode(Platform::GitLab, body)?;
        let repositories: Vec<Repository> = projects.into_iter().map(gitlab_to_repo).collect();

        Ok(SearchPage {
            has_more: !repositories.is_empty(),
            total_count: Metric::Unavailable,
            repositories,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    pub name: String,
    pub path_with_namespace: String,
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: String,
    pub web_url: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_activity_at: String,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub archived: bool,
    /// Only present when issues are enabled for the project
    pub open_issues_count: Option<u64>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub license: Option<GitLabLicense>,
    pub forked_from_project: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabLicense {
    pub name: Option<String>,
}

fn gitlab_to_repo(gl: GitLabProject) -> Repository {
    Repository {
        name: gl.name,
        full_name: gl.path_with_namespace,
        description: trimmed(gl.description),
        url: gl.web_url,
        stars: Metric::Known(gl.star_count),
        forks: Metric::Known(gl.forks_count),
        // The project listing doesn't carry a language
        language: Label::Unknown,
        created_at: gl.created_at,
        updated_at: gl.last_activity_at,
        is_private: gl.visibility == "private",
        is_fork: gl.forked_from_project.is_some(),
        is_archived: gl.archived,
        topics: gl.topics,
        license: Label::license(gl.license.and_then(|l| l.name)),
        open_issues: Metric::from(gl.open_issues_count),
    }
}
