use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::{model::Entry, parser};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FeedSource;
use crate::error::FetchError;

/// Upper bound on items a single feed contributes to one aggregation.
pub const ITEMS_PER_FEED: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub source: String,
    pub category: String,
    pub guid: String,
}

impl NewsItem {
    /// Sort key; undated items rank as if published at the Unix epoch.
    pub fn recency(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Result of fetching one feed. A failure keeps its reason so callers can
/// report per-source health, but never carries items.
#[derive(Debug)]
pub enum FeedOutcome {
    Fetched(Vec<NewsItem>),
    Failed(String),
}

impl FeedOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FeedOutcome::Fetched(_))
    }

    pub fn items(&self) -> &[NewsItem] {
        match self {
            FeedOutcome::Fetched(items) => items,
            FeedOutcome::Failed(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FeedOutcome::Fetched(_) => None,
            FeedOutcome::Failed(reason) => Some(reason),
        }
    }

    pub fn into_items(self) -> Vec<NewsItem> {
        match self {
            FeedOutcome::Fetched(items) => items,
            FeedOutcome::Failed(_) => Vec::new(),
        }
    }
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// `timeout` bounds each feed request on its own.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("ResearchNews/1.0 (RSS Aggregator)")
            .build()?;

        Ok(Self { client })
    }

    /// Fetch and normalize one feed. Errors are logged and folded into
    /// [`FeedOutcome::Failed`]; they never escape.
    pub async fn fetch_single_feed(&self, source: &FeedSource) -> FeedOutcome {
        match self.try_fetch(source).await {
            Ok(items) => {
                debug!("Fetched {} items from '{}'", items.len(), source.name);
                FeedOutcome::Fetched(items)
            }
            Err(e) => {
                warn!("Error fetching '{}' feed ({}): {}", source.name, source.url, e);
                FeedOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_fetch(&self, source: &FeedSource) -> Result<Vec<NewsItem>, FetchError> {
        let response = self.client.get(&source.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Self::parse_items(&bytes, source)
    }

    /// Parse a feed document and normalize its first [`ITEMS_PER_FEED`]
    /// entries, keeping upstream order.
    pub fn parse_items(bytes: &[u8], source: &FeedSource) -> Result<Vec<NewsItem>, FetchError> {
        let parsed = parser::parse(bytes)?;

        Ok(parsed
            .entries
            .iter()
            .take(ITEMS_PER_FEED)
            .enumerate()
            .map(|(index, entry)| Self::normalize_entry(source, entry, index))
            .collect())
    }

    pub fn normalize_entry(source: &FeedSource, entry: &Entry, index: usize) -> NewsItem {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        let published_at = entry.published.or(entry.updated);

        let summary = entry
            .summary
            .as_ref()
            .map(|s| snippet(&s.content))
            .filter(|s| !s.is_empty())
            .or_else(|| {
                entry
                    .content
                    .as_ref()
                    .and_then(|c| c.body.as_deref())
                    .map(snippet)
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_default();

        let guid = if !entry.id.is_empty() {
            entry.id.clone()
        } else if !link.is_empty() {
            link.clone()
        } else {
            format!("{}#{}", source.name, index)
        };

        NewsItem {
            title,
            link,
            published_at,
            summary,
            source: source.name.clone(),
            category: source.category.clone(),
            guid,
        }
    }
}

/// Plain-text rendering of an HTML fragment: tags dropped, entities
/// decoded, whitespace collapsed. A `<` only opens a tag when followed by
/// `/`, `!` or a letter, so text like `p < 0.05` survives.
pub fn snippet(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        if in_tag {
            if c == '>' {
                in_tag = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('<', Some(&next)) if next == '/' || next == '!' || next.is_ascii_alphabetic() => {
                in_tag = true;
                text.push(' ');
            }
            _ => text.push(c),
        }
    }

    // Decoded after stripping so escaped markup stays as text
    html_escape::decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
