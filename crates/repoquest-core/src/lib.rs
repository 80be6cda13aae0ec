// Search orchestration core - pagination, retries, and the shared record shape
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod retry;
pub mod search;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::Error;
pub use export::Exporter;
pub use models::{Label, Metric, Platform, Repository, SearchPage, SearchResult};
pub use retry::{Fetcher, RetryConfig};
pub use search::{
    validate_page_params, SearchConfig, SearchEngine, SearchProvider, Searcher, PER_PAGE,
};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
