use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Platform;
use crate::retry::RetryConfig;
use crate::search::SearchConfig;

/// Main configuration structure
///
/// Loaded from `<config dir>/repoquest/config.toml`. Credentials can also
/// come from the environment, which wins over the file.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub platforms: PlatformConfig,
}

impl Config {
    /// Load config from default location, falling back to defaults, then
    /// layer environment credentials on top
    pub fn load() -> crate::Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Read a config file as-is. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.search.max_pages == 0 {
            return Err(crate::Error::ConfigError(
                "search.max_pages must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }

    /// Uses XDG on Linux/macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("repoquest");

        Ok(config_dir.join("config.toml"))
    }

    /// Override file values with non-empty environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for platform in Platform::ALL {
            if let Some(token) = set(token_env_var(platform)) {
                self.platforms.get_mut(platform).token = Some(token);
            }
        }
        if let Some(language) = set("GITCODE_LANG") {
            self.platforms.gitcode.language = Some(language);
        }
    }

    pub fn token(&self, platform: Platform) -> Option<String> {
        self.platforms
            .get(platform)
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn api_url(&self, platform: Platform) -> Option<&str> {
        self.platforms.get(platform).api_url.as_deref()
    }

    /// Language filter for GitCode searches
    pub fn gitcode_language(&self) -> Option<String> {
        self.platforms.gitcode.language.clone()
    }
}

/// Environment variable holding a platform's credential
pub fn token_env_var(platform: Platform) -> &'static str {
    match platform {
        Platform::GitHub => "GITHUB_TOKEN",
        Platform::GitLab => "GITLAB_TOKEN",
        Platform::Bitbucket => "BITBUCKET_TOKEN",
        Platform::GitCode => "GITCODE_TOKEN",
        Platform::Gitee => "GITEE_TOKEN",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Pages fetched when the CLI doesn't say otherwise
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

fn default_max_pages() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_page_delay_ms() -> u64 {
    100
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    #[serde(default)]
    pub github: ProviderConfig,
    #[serde(default)]
    pub gitlab: ProviderConfig,
    /// Token format is "username:app_password"
    #[serde(default)]
    pub bitbucket: ProviderConfig,
    #[serde(default)]
    pub gitcode: GitCodeConfig,
    #[serde(default)]
    pub gitee: ProviderConfig,
}

impl PlatformConfig {
    pub fn get(&self, platform: Platform) -> &ProviderConfig {
        match platform {
            Platform::GitHub => &self.github,
            Platform::GitLab => &self.gitlab,
            Platform::Bitbucket => &self.bitbucket,
            Platform::GitCode => &self.gitcode.provider,
            Platform::Gitee => &self.gitee,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut ProviderConfig {
        match platform {
            Platform::GitHub => &mut self.github,
            Platform::GitLab => &mut self.gitlab,
            Platform::Bitbucket => &mut self.bitbucket,
            Platform::GitCode => &mut self.gitcode.provider,
            Platform::Gitee => &mut self.gitee,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub token: Option<String>,

    /// API base URL (for self-hosted instances)
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitCodeConfig {
    #[serde(flatten)]
    pub provider: ProviderConfig,

    pub language: Option<String>,
}
