use repoquest_core::{validate_page_params, Error, Platform, Result};
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

const AGENT: &str = concat!("repoquest/", env!("CARGO_PKG_VERSION"));

/// `<base><path>?<params>` with the page arguments checked first
pub(crate) fn search_url(
    base_url: &str,
    path: &str,
    page: u32,
    per_page: u32,
    params: &[(&str, &str)],
) -> Result<Url> {
    validate_page_params(page, per_page)?;

    let base = base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}{}", base, path))
        .map_err(|e| Error::ConfigError(format!("Failed to parse base URL {}: {}", base, e)))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url)
}

/// Headers every provider sends
pub(crate) fn with_default_headers(request: RequestBuilder, accept: &'static str) -> RequestBuilder {
    request
        .header(ACCEPT, HeaderValue::from_static(accept))
        .header(USER_AGENT, HeaderValue::from_static(AGENT))
}

pub(crate) fn decode<T: DeserializeOwned>(platform: Platform, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::ParseError(format!("failed to decode {} response: {}", platform, e)))
}

pub(crate) fn trimmed(description: Option<String>) -> String {
    description.map(|d| d.trim().to_string()).unwrap_or_default()
}
