// Provider adapters for the hosting services we can search
mod common;

pub mod bitbucket;
pub mod gitcode;
pub mod gitee;
pub mod github;
pub mod gitlab;

pub use bitbucket::BitbucketProvider;
pub use gitcode::GitCodeProvider;
pub use gitee::GiteeProvider;
pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;

use repoquest_core::{Config, Platform, SearchProvider};

/// Build the adapter for `platform` from credentials and URLs in `config`
pub fn provider_for(platform: Platform, config: &Config) -> Box<dyn SearchProvider> {
    let token = config.token(platform);
    let api_url = config.api_url(platform).map(str::to_string);

    match platform {
        Platform::GitHub => Box::new(match api_url {
            Some(url) => GitHubProvider::with_base_url(token, url),
            None => GitHubProvider::new(token),
        }),
        Platform::GitLab => Box::new(match api_url {
            Some(url) => GitLabProvider::with_base_url(token, url),
            None => GitLabProvider::new(token),
        }),
        Platform::Bitbucket => Box::new(match api_url {
            Some(url) => BitbucketProvider::with_base_url(token, url),
            None => BitbucketProvider::new(token),
        }),
        Platform::GitCode => {
            let provider = match api_url {
                Some(url) => GitCodeProvider::with_base_url(token, url),
                None => GitCodeProvider::new(token),
            };
            Box::new(provider.with_language(config.gitcode_language()))
        }
        Platform::Gitee => Box::new(match api_url {
            Some(url) => GiteeProvider::with_base_url(token, url),
            None => GiteeProvider::new(token),
        }),
    }
}
