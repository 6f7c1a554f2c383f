use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A named, categorized upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub category: String,
}

impl FeedSource {
    pub fn new(name: &str, url: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
        }
    }
}

/// The fixed set of feeds an aggregator draws from.
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// between concurrent requests behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    sources: Vec<FeedSource>,
}

impl FeedRegistry {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self { sources }
    }

    /// Curated research news feeds.
    pub fn research() -> Self {
        Self::new(vec![
            FeedSource::new("Nature", "https://www.nature.com/nature.rss", "science"),
            FeedSource::new(
                "MIT Technology Review",
                "https://www.technologyreview.com/feed/",
                "technology",
            ),
            FeedSource::new(
                "arXiv CS",
                "http://export.arxiv.org/rss/cs",
                "computer science",
            ),
            FeedSource::new(
                "PNAS",
                "https://www.pnas.org/action/showFeed?type=etoc&feed=rss&jc=pnas",
                "science",
            ),
        ])
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources whose category matches case-insensitively, in registry order.
    /// A missing or empty category selects every source.
    pub fn select(&self, category: Option<&str>) -> Vec<FeedSource> {
        match category.filter(|c| !c.is_empty()) {
            Some(category) => {
                let wanted = category.to_lowercase();
                self.sources
                    .iter()
                    .filter(|source| source.category.to_lowercase() == wanted)
                    .cloned()
                    .collect()
            }
            None => self.sources.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Per-feed request timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Directory with a built frontend to serve for unmatched paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            static_dir: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Like [`Config::load`], but a missing file is `Ok(None)` rather than
    /// an error.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> anyhow::Result<Option<Self>> {
        if path.as_ref().exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Bind address with the port replaced when `port` is given.
    pub fn listen_addr(&self, port: Option<&str>) -> String {
        match port {
            Some(port) => format!("0.0.0.0:{}", port),
            None => self.bind_addr.clone(),
        }
    }
}
