use thiserror::Error;

/// Why a single feed could not be turned into news items.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("feed could not be parsed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// Outcome of an aggregation request that did not produce a news list.
#[derive(Debug, Error)]
pub enum NewsError {
    #[error("No feeds found for the specified category")]
    NoFeeds { category: String },

    #[error("Error fetching research news: {0}")]
    Internal(String),
}
