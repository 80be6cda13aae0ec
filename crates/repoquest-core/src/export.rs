use crate::models::{Metric, Repository, SearchResult};
use crate::{Error, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Rendering and file output for search results
pub struct Exporter;

impl Exporter {
    /// Pretty-printed JSON array of the records
    pub fn to_json(repos: &[Repository]) -> Result<String> {
        Ok(serde_json::to_string_pretty(repos)?)
    }

    /// File name used for a result, e.g. `Out-GitHub.json`
    pub fn file_name(result: &SearchResult) -> String {
        let source = result.source.to_string().replace(' ', "");
        format!("Out-{}.json", source)
    }

    /// Write the records to `dir`. Empty results don't produce a file.
    pub fn write_json(result: &SearchResult, dir: &Path) -> Result<Option<PathBuf>> {
        if result.items.is_empty() {
            return Ok(None);
        }

        let path = dir.join(Self::file_name(result));
        let content = Self::to_json(&result.items)?;
        std::fs::write(&path, content).map_err(|e| {
            Error::ConfigError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(Some(path))
    }

    /// Human-readable listing of the records
    pub fn summary(result: &SearchResult) -> String {
        if result.items.is_empty() {
            return "No repositories found.\n".to_string();
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Found {} repositories from {}:\n",
            result.items.len(),
            result.source
        );

        for (i, repo) in result.items.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, repo.full_name);
            let _ = writeln!(out, "   URL: {}", repo.url);
            let _ = writeln!(out, "   Description: {}", repo.description);
            let _ = writeln!(
                out,
                "   Language: {} | Stars: {} | Forks: {}",
                repo.language, repo.stars, repo.forks
            );
            let _ = writeln!(
                out,
                "   Created: {} | Updated: {}",
                repo.created_at, repo.updated_at
            );
            if !repo.topics.is_empty() {
                let _ = writeln!(out, "   Topics: {}", repo.topics.join(", "));
            }
            let _ = writeln!(out, "{}", "-".repeat(50));
        }

        out
    }

    /// Closing statistics for one search
    pub fn completion_report(result: &SearchResult) -> String {
        let total = match result.total_count {
            Metric::Known(n) => n.to_string(),
            Metric::Unavailable => "Unknown".to_string(),
        };

        format!(
            "Search completed:\n- Service: {}\n- Query: {:?}\n- Total repositories available: {}\n- Repositories retrieved: {}\n",
            result.source,
            result.query,
            total,
            result.items.len()
        )
    }
}
