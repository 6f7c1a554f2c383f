use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::config::{FeedRegistry, FeedSource};
use crate::error::NewsError;
use crate::fetcher::{FeedOutcome, Fetcher, NewsItem};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub news: Vec<NewsItem>,
    pub meta: NewsMeta,
}

#[derive(Debug, Serialize)]
pub struct NewsMeta {
    /// Number of items returned
    pub total: usize,
    /// Every source that was queried, whether or not it returned data
    pub sources: Vec<String>,
    pub feeds: Vec<FeedReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Ok,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct FeedReport {
    pub name: String,
    pub status: FeedStatus,
    pub items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fans out over the registry's feeds and merges the results into one
/// recency-ordered list. Holds no per-request state.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<FeedRegistry>,
    fetcher: Arc<Fetcher>,
    default_limit: usize,
    max_limit: usize,
}

impl Aggregator {
    pub fn new(registry: FeedRegistry, fetcher: Fetcher) -> Self {
        Self {
            registry: Arc::new(registry),
            fetcher: Arc::new(fetcher),
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self.default_limit = default_limit.min(max_limit);
        self
    }

    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }

    pub async fn get_research_news(&self, query: NewsQuery) -> Result<NewsResponse, NewsError> {
        let category = query.category.as_deref();
        let sources = self.registry.select(category);

        if sources.is_empty() {
            info!("No feeds match category {:?}", category);
            return Err(NewsError::NoFeeds {
                category: category.unwrap_or_default().to_string(),
            });
        }

        let limit = self.effective_limit(query.limit);
        let fetcher = self.fetcher.clone();

        // A panic anywhere in the pipeline surfaces as a join error here
        tokio::spawn(aggregate(fetcher, sources, limit))
            .await
            .map_err(aggregation_failed)
    }
}

fn aggregation_failed(e: JoinError) -> NewsError {
    error!("News aggregation failed: {}", e);
    NewsError::Internal(e.to_string())
}

async fn aggregate(fetcher: Arc<Fetcher>, sources: Vec<FeedSource>, limit: usize) -> NewsResponse {
    info!("Fetching {} feeds", sources.len());

    let outcomes = fetch_all(fetcher, &sources).await;

    let mut feeds = Vec::with_capacity(sources.len());
    let mut merged = Vec::new();
    for (source, outcome) in sources.iter().zip(outcomes) {
        feeds.push(FeedReport {
            name: source.name.clone(),
            status: if outcome.is_fetched() {
                FeedStatus::Ok
            } else {
                FeedStatus::Failed
            },
            items: outcome.items().len(),
            error: outcome.error().map(str::to_string),
        });
        merged.extend(outcome.into_items());
    }

    let news = rank(merged, limit);
    info!("Returning {} news items from {} feeds", news.len(), sources.len());

    NewsResponse {
        meta: NewsMeta {
            total: news.len(),
            sources: sources.into_iter().map(|s| s.name).collect(),
            feeds,
        },
        news,
    }
}

/// One task per source, all awaited. Outcomes come back in `sources` order
/// regardless of completion order.
async fn fetch_all(fetcher: Arc<Fetcher>, sources: &[FeedSource]) -> Vec<FeedOutcome> {
    let handles = sources.iter().cloned().map(|source| {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch_single_feed(&source).await })
    });

    join_all(handles)
        .await
        .into_iter()
        .zip(sources)
        .map(|(joined, source)| settle(joined, source))
        .collect()
}

/// A fetch task that died (panic or abort) counts as that source failing.
fn settle(joined: Result<FeedOutcome, JoinError>, source: &FeedSource) -> FeedOutcome {
    joined.unwrap_or_else(|e| {
        error!("Fetch task for '{}' aborted: {}", source.name, e);
        FeedOutcome::Failed(format!("fetch task aborted: {}", e))
    })
}

/// Newest first, undated items last, then truncated to `limit`.
pub fn rank(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.recency().cmp(&a.recency()));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn item(guid: &str, published_at: Option<DateTime<Utc>>) -> NewsItem {
        NewsItem {
            title: guid.to_string(),
            link: format!("https://example.org/{}", guid),
            published_at,
            summary: String::new(),
            source: "Test".to_string(),
            category: "science".to_string(),
            guid: guid.to_string(),
        }
    }

    fn hours_ago(hours: i64) -> Option<DateTime<Utc>> {
        Some(Utc::now() - ChronoDuration::hours(hours))
    }

    fn aggregator(sources: Vec<FeedSource>) -> Aggregator {
        Aggregator::new(
            FeedRegistry::new(sources),
            Fetcher::new(Duration::from_secs(1)).unwrap(),
        )
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn test_newest_first() {
            let items = vec![item("old", hours_ago(5)), item("new", hours_ago(1)), item("mid", hours_ago(3))];
            let ranked = rank(items, 10);
            let guids: Vec<&str> = ranked.iter().map(|i| i.guid.as_str()).collect();
            assert_eq!(guids, vec!["new", "mid", "old"]);
        }

        #[test]
        fn test_undated_items_sink() {
            let items = vec![item("undated", None), item("dated", hours_ago(10_000))];
            let ranked = rank(items, 10);
            assert_eq!(ranked[0].guid, "dated");
            assert_eq!(ranked[1].guid, "undated");
        }

        #[test]
        fn test_truncates_to_limit() {
            let items: Vec<NewsItem> = (0..10).map(|i| item(&format!("n{}", i), hours_ago(i))).collect();
            let ranked = rank(items, 3);
            let guids: Vec<&str> = ranked.iter().map(|i| i.guid.as_str()).collect();
            assert_eq!(guids, vec!["n0", "n1", "n2"]);
        }

        #[test]
        fn test_zero_limit() {
            let items = vec![item("a", hours_ago(1))];
            assert!(rank(items, 0).is_empty());
        }

        #[test]
        fn test_empty_input() {
            assert!(rank(Vec::new(), 50).is_empty());
        }
    }

    mod limit_tests {
        use super::*;

        #[test]
        fn test_default_limit() {
            let agg = aggregator(vec![]);
            assert_eq!(agg.effective_limit(None), DEFAULT_LIMIT);
        }

        #[test]
        fn test_requested_limit() {
            let agg = aggregator(vec![]);
            assert_eq!(agg.effective_limit(Some(7)), 7);
        }

        #[test]
        fn test_limit_is_clamped() {
            let agg = aggregator(vec![]);
            assert_eq!(agg.effective_limit(Some(1_000_000)), MAX_LIMIT);
        }

        #[test]
        fn test_custom_limits() {
            let agg = aggregator(vec![]).with_limits(20, 30);
            assert_eq!(agg.effective_limit(None), 20);
            assert_eq!(agg.effective_limit(Some(31)), 30);
        }

        #[test]
        fn test_default_never_exceeds_max() {
            let agg = aggregator(vec![]).with_limits(100, 10);
            assert_eq!(agg.effective_limit(None), 10);
        }
    }

    mod get_research_news_tests {
        use super::*;

        #[tokio::test]
        async fn test_unknown_category_is_not_found() {
            let agg = aggregator(vec![FeedSource::new("Nature", "http://127.0.0.1:9/n", "science")]);
            let result = agg
                .get_research_news(NewsQuery {
                    category: Some("poetry".to_string()),
                    limit: None,
                })
                .await;

            match result {
                Err(NewsError::NoFeeds { category }) => assert_eq!(category, "poetry"),
                other => panic!("expected NoFeeds, got {:?}", other.map(|r| r.meta.total)),
            }
        }

        #[tokio::test]
        async fn test_empty_registry_is_not_found() {
            let agg = aggregator(vec![]);
            let result = agg.get_research_news(NewsQuery::default()).await;
            assert!(matches!(result, Err(NewsError::NoFeeds { .. })));
        }

        #[tokio::test]
        async fn test_all_feeds_failing_is_empty_success() {
            let agg = aggregator(vec![
                FeedSource::new("A", "http://127.0.0.1:9/a", "science"),
                FeedSource::new("B", "http://127.0.0.1:9/b", "technology"),
            ]);

            let response = agg.get_research_news(NewsQuery::default()).await.unwrap();

            assert!(response.news.is_empty());
            assert_eq!(response.meta.total, 0);
            assert_eq!(response.meta.sources, vec!["A", "B"]);
            assert_eq!(response.meta.feeds.len(), 2);
            assert!(response
                .meta
                .feeds
                .iter()
                .all(|f| f.status == FeedStatus::Failed && f.error.is_some()));
        }
    }

    mod task_failure_tests {
        use super::*;

        async fn panicked_join_error() -> JoinError {
            tokio::spawn(async { panic!("boom") })
                .await
                .map(|_: ()| ())
                .unwrap_err()
        }

        #[tokio::test]
        async fn test_panicked_fetch_task_becomes_failed() {
            let source = FeedSource::new("Nature", "http://127.0.0.1:9/n", "science");
            let outcome = settle(Err(panicked_join_error().await), &source);

            assert!(!outcome.is_fetched());
            assert!(outcome.error().unwrap().starts_with("fetch task aborted"));
            assert!(outcome.into_items().is_empty());
        }

        #[tokio::test]
        async fn test_siblings_of_panicked_task_are_kept() {
            let ok_source = FeedSource::new("MIT Technology Review", "http://127.0.0.1:9/m", "technology");
            let bad_source = FeedSource::new("Nature", "http://127.0.0.1:9/n", "science");

            let fetched = settle(
                Ok(FeedOutcome::Fetched(vec![item("kept", hours_ago(1))])),
                &ok_source,
            );
            let failed = settle(Err(panicked_join_error().await), &bad_source);

            assert!(fetched.is_fetched());
            assert_eq!(fetched.items()[0].guid, "kept");
            assert!(!failed.is_fetched());
        }

        #[tokio::test]
        async fn test_panicked_pipeline_becomes_internal_error() {
            let err = aggregation_failed(panicked_join_error().await);
            assert!(matches!(err, NewsError::Internal(_)));
        }
    }

    #[test]
    fn test_meta_serialization() {
        let meta = NewsMeta {
            total: 0,
            sources: vec!["Nature".to_string()],
            feeds: vec![
                FeedReport {
                    name: "Nature".to_string(),
                    status: FeedStatus::Ok,
                    items: 0,
                    error: None,
                },
                FeedReport {
                    name: "PNAS".to_string(),
                    status: FeedStatus::Failed,
                    items: 0,
                    error: Some("upstream returned status 500".to_string()),
                },
            ],
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["feeds"][0]["status"], "ok");
        assert!(json["feeds"][0].get("error").is_none());
        assert_eq!(json["feeds"][1]["status"], "failed");
        assert_eq!(json["feeds"][1]["error"], "upstream returned status 500");
    }

    #[test]
    fn test_news_item_uses_camel_case() {
        let json = serde_json::to_value(item("x", None)).unwrap();
        assert!(json.get("publishedAt").is_some());
        assert!(json.get("published_at").is_none());
    }
}
