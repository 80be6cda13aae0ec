use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use repoquest_api::provider_for;
use repoquest_core::{Config, Exporter, Fetcher, Platform, SearchEngine, SearchResult, Searcher};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "repoquest")]
#[command(version, about = "Search repositories across Git hosting platforms", long_about = None)]
struct Cli {
    /// Search query
    query: String,

    /// Platform to search, repeat for several
    #[arg(short, long = "platform", value_enum, default_value = "github")]
    platforms: Vec<PlatformArg>,

    /// Maximum number of pages per platform
    #[arg(long)]
    pages: Option<u32>,

    /// Overall deadline per platform, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Directory for Out-<Platform>.json files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Language filter (GitCode only)
    #[arg(long)]
    language: Option<String>,

    /// Print results without writing JSON files
    #[arg(long)]
    no_file: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PlatformArg {
    Github,
    Gitlab,
    Bitbucket,
    Gitcode,
    Gitee,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Github => Platform::GitHub,
            PlatformArg::Gitlab => Platform::GitLab,
            PlatformArg::Bitbucket => Platform::Bitbucket,
            PlatformArg::Gitcode => Platform::GitCode,
            PlatformArg::Gitee => Platform::Gitee,
        }
    }
}

impl Cli {
    /// Requested platforms in order, duplicates dropped
    fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = Vec::new();
        for arg in &self.platforms {
            let platform = Platform::from(*arg);
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        platforms
    }

    /// Layer flag values over the loaded config
    fn apply_to(&self, config: &mut Config) {
        if let Some(pages) = self.pages {
            config.search.max_pages = pages;
        }
        if let Some(timeout) = self.timeout {
            config.search.timeout_secs = timeout;
        }
        if let Some(ref language) = self.language {
            config.platforms.gitcode.language = Some(language.clone());
        }
    }
}

/// GitHub and GitLab work anonymously with lower rate limits, the others
/// refuse to search without a credential.
fn check_credentials(platforms: &[Platform], config: &Config) -> anyhow::Result<()> {
    for &platform in platforms {
        if config.token(platform).is_some() {
            continue;
        }

        let var = repoquest_core::config::token_env_var(platform);
        match platform {
            Platform::GitHub | Platform::GitLab => {
                warn!("{} not set, {} searches are rate limited", var, platform);
            }
            _ => anyhow::bail!("{} requires a credential: set {} or add it to the config file", platform, var),
        }
    }
    Ok(())
}

/// Write the JSON file for one result. A failed write is reported and the
/// run carries on with the remaining platforms.
fn save_json(result: &SearchResult, dir: &Path) -> Option<PathBuf> {
    match Exporter::write_json(result, dir) {
        Ok(Some(path)) => {
            info!("Results saved to {}", path.display());
            Some(path)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to write JSON output for {}: {}", result.source, e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repoquest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    config.validate()?;

    let platforms = cli.platforms();
    check_credentials(&platforms, &config)?;

    let client = Fetcher::default_client()?;
    let mut engine = SearchEngine::new();
    for &platform in &platforms {
        let fetcher = Fetcher::new(client.clone(), config.retry.clone());
        engine.add_searcher(
            Searcher::new(provider_for(platform, &config), fetcher)
                .with_config(config.search.search_config()),
        );
    }

    info!("Searching {} platform(s) for: {}", engine.len(), cli.query);
    let timeout: Duration = config.search.timeout();
    let outcomes = engine
        .search_all(&cli.query, config.search.max_pages, timeout)
        .await;

    let mut failures = 0;
    for (platform, outcome) in &outcomes {
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                failures += 1;
                eprintln!("{} search failed: {}", platform, e);
                continue;
            }
        };

        print!("{}", Exporter::summary(result));

        if !cli.no_file {
            save_json(result, &cli.output_dir);
        }

        eprint!("{}", Exporter::completion_report(result));
    }

    if failures > 0 && failures == outcomes.len() {
        anyhow::bail!("all {} platform search(es) failed", failures);
    }

    Ok(())
}
