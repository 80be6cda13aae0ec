use repoquest_core::{
    Error, Label, Metric, Platform, Repository, Result, SearchPage, SearchProvider,
};
use reqwest::Url;
use serde::Deserialize;

use crate::common::{decode, search_url, trimmed, with_default_headers};

const BITBUCKET_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Bitbucket Cloud repository listing
///
/// Note: Bitbucket has no global public search. Authenticated calls only see
/// repositories the account has an explicit role on.
pub struct BitbucketProvider {
    /// "username:app_password"
    credential: Option<String>,
    base_url: String,
}

impl BitbucketProvider {
    pub fn new(credential: Option<String>) -> Self {
        Self::with_base_url(credential, BITBUCKET_API_BASE.to_string())
    }

    /// For Bitbucket Server/Data Center or testing with custom API URL
    pub fn with_base_url(credential: Option<String>, base_url: String) -> Self {
        Self {
            credential,
            base_url,
        }
    }

    /// Create Basic Auth header value
    fn basic_auth_header(&self) -> Result<Option<String>> {
        let Some(ref credential) = self.credential else {
            return Ok(None);
        };

        match credential.split_once(':') {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", username, password).as_bytes(),
                );
                Ok(Some(format!("Basic {}", encoded)))
            }
            _ => Err(Error::ConfigError(
                "invalid Bitbucket credential format; expected 'username:app_password'".into(),
            )),
        }
    }
}

impl SearchProvider for BitbucketProvider {
    fn platform(&self) -> Platform {
        Platform::Bitbucket
    }

    fn build_search_url(&self, query: &str, page: u32, per_page: u32) -> Result<Url> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let filter = format!("name~\"{}\"", query.replace('"', "\\\""));
        search_url(
            &self.base_url,
            "/repositories",
            page,
            per_page,
            &[
                ("q", filter.as_str()),
                ("page", page_param.as_str()),
                ("pagelen", per_page_param.as_str()),
            ],
        )
    }

    fn build_search_request(&self, client: &reqwest::Client, url: &Url) -> Result<reqwest::Request> {
        let mut request = with_default_headers(client.get(url.clone()), "application/json");

        if let Some(auth) = self.basic_auth_header()? {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        Ok(request.build()?)
    }

    /// Bitbucket hands out a `next` link while more pages exist, so this is
    /// the one provider with an authoritative end-of-results signal.
    fn parse_search_response(&self, body: &[u8]) -> Result<SearchPage> {
        let response: SearchResponse = decode(Platform::Bitbucket, body)?;
        let repositories = response.values.into_iter().map(bitbucket_to_repo).collect();

        Ok(SearchPage {
            repositories,
            total_count: Metric::from(response.size),
            has_more: response.next.is_some_and(|next| !next.is_empty()),
        })
    }
}

/// Bitbucket API repository list response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    values: Vec<BitbucketRepository>,
    size: Option<u64>,
    next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitbucketRepository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    pub links: Links,
    #[serde(default)]
    pub created_on: String,
    #[serde(default)]
    pub updated_on: String,
    pub language: Option<String>,
    /// Set when the repository is a fork
    pub parent: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Links {
    pub html: Link,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

/// The listing endpoint has no stars, forks, issues, topics or license
fn bitbucket_to_repo(bb: BitbucketRepository) -> Repository {
    Repository {
        name: bb.name,
        full_name: bb.full_name,
        description: trimmed(bb.description),
        url: bb.links.html.href,
        stars: Metric::Unavailable,
        forks: Metric::Unavailable,
        language: Label::language(bb.language),
        created_at: bb.created_on,
        updated_at: bb.updated_on,
        is_private: bb.is_private,
        is_fork: bb.parent.is_some(),
        is_archived: false,
        topics: Vec::new(),
        license: Label::Unknown,
        open_issues: Metric::Unavailable,
    }
}
