use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Which hosting service a result came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    GitHub,
    GitLab,
    Bitbucket,
    GitCode,
    Gitee,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::GitHub,
        Platform::GitLab,
        Platform::Bitbucket,
        Platform::GitCode,
        Platform::Gitee,
    ];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::GitHub => write!(f, "GitHub"),
            Platform::GitLab => write!(f, "GitLab"),
            Platform::Bitbucket => write!(f, "Bitbucket"),
            Platform::GitCode => write!(f, "GitCode"),
            Platform::Gitee => write!(f, "Gitee"),
        }
    }
}

impl FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Platform::GitHub),
            "gitlab" => Ok(Platform::GitLab),
            "bitbucket" => Ok(Platform::Bitbucket),
            "gitcode" => Ok(Platform::GitCode),
            "gitee" => Ok(Platform::Gitee),
            other => Err(crate::Error::InvalidArgument(format!(
                "unknown platform '{}', expected one of github, gitlab, bitbucket, gitcode, gitee",
                other
            ))),
        }
    }
}

/// A numeric field some providers cannot report
///
/// Serializes as a number, or `null` when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    Known(u64),
    #[default]
    Unavailable,
}

impl Metric {
    pub fn known(self) -> Option<u64> {
        match self {
            Metric::Known(n) => Some(n),
            Metric::Unavailable => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Metric::Known(_))
    }
}

impl From<u64> for Metric {
    fn from(n: u64) -> Self {
        Metric::Known(n)
    }
}

impl From<Option<u64>> for Metric {
    fn from(n: Option<u64>) -> Self {
        n.map_or(Metric::Unavailable, Metric::Known)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Known(n) => write!(f, "{}", n),
            Metric::Unavailable => write!(f, "N/A"),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.known().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<u64>::deserialize(deserializer).map(Metric::from)
    }
}

/// A text label with explicit markers for "absent" and "not reported"
///
/// `None` means the provider says there is nothing (e.g. a repository
/// without a license). `Unknown` means the provider did not tell us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Known(String),
    None,
    Unknown,
}

impl Label {
    /// Primary language: anything missing or blank is `Unknown`
    pub fn language(value: Option<String>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => Label::Known(v),
            _ => Label::Unknown,
        }
    }

    /// License as reported by a provider that does expose licenses
    pub fn license(value: Option<String>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => Label::Known(v),
            _ => Label::None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Known(v) => v,
            Label::None => "None",
            Label::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "None" => Label::None,
            "Unknown" => Label::Unknown,
            _ => Label::Known(value),
        })
    }
}

/// Provider-agnostic repository summary
///
/// Every field is always populated. Timestamps are kept exactly as the
/// provider sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub url: String,
    pub stars: Metric,
    pub forks: Metric,
    pub language: Label,
    pub created_at: String,
    pub updated_at: String,
    pub is_private: bool,
    pub is_fork: bool,
    pub is_archived: bool,
    pub topics: Vec<String>,
    pub license: Label,
    pub open_issues: Metric,
}

/// One decoded page as returned by a provider adapter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub repositories: Vec<Repository>,
    pub total_count: Metric,
    /// Best-effort hint that another page may exist
    pub has_more: bool,
}

/// Everything one search invocation collected, in page-arrival order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: Platform,
    pub query: String,
    /// Total available at the provider, not just what was retrieved
    pub total_count: Metric,
    pub items: Vec<Repository>,
}

impl SearchResult {
    pub fn new(source: Platform, query: impl Into<String>) -> Self {
        Self {
            source,
            query: query.into(),
            total_count: Metric::Unavailable,
            items: Vec::new(),
        }
    }
}
