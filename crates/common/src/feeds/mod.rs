//! RSS/Atom feed aggregation
//!
//! Fetches a fixed list of sources, keeps the newest items from each, and
//! merges them into one list sorted newest-first. A failing source is
//! logged and contributes zero items; partial results are the intended
//! behavior, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::FeedsConfig;
use crate::errors::Result;
use crate::metrics;

/// One normalized feed item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedItem {
    pub source: String,
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

#[derive(Clone)]
pub struct FeedAggregator {
    client: reqwest::Client,
    config: FeedsConfig,
}

impl FeedAggregator {
    pub fn new(config: FeedsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent("reelsmith-feeds/0.3")
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }

    /// Fetch and merge all configured sources
    pub async fn aggregate(&self) -> Result<Vec<FeedItem>> {
        let mut items = Vec::new();
        for source in &self.config.sources {
            match self.fetch_source(source).await {
                Ok(mut fetched) => {
                    fetched.truncate(self.config.items_per_source);
                    items.extend(fetched);
                }
                Err(e) => {
                    metrics::record_feed_error(source);
                    tracing::warn!(source = %source, error = %e, "Feed source skipped");
                }
            }
        }

        // Newest first; undated items sink to the end
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(items)
    }

    async fn fetch_source(&self, url: &str) -> anyhow::Result<Vec<FeedItem>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let source = source_label(url);
        Ok(parse_feed(&body, &source)?)
    }
}

/// Parse raw feed bytes into normalized items, newest first
pub fn parse_feed(body: &[u8], source: &str) -> anyhow::Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(body)?;
    let mut items: Vec<FeedItem> = feed
        .entries
        .into_iter()
        .map(|entry| FeedItem {
            source: source.to_string(),
            title: entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".to_string()),
            link: entry.links.first().map(|l| l.href.clone()),
            published_at: entry.published.or(entry.updated),
            summary: entry.summary.map(|s| s.content),
        })
        .collect();
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    Ok(items)
}

/// Short label for a source URL (its host, or the URL itself)
fn source_label(url: &str) -> String {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .and_then(|rest| rest.split('/').next())
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <item>
      <title>Older post</title>
      <link>https://example.com/older</link>
      <pubDate>Mon, 02 Jun 2025 09:00:00 GMT</pubDate>
      <description>First</description>
    </item>
    <item>
      <title>Newer post</title>
      <link>https://example.com/newer</link>
      <pubDate>Tue, 03 Jun 2025 09:00:00 GMT</pubDate>
      <description>Second</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_sorts_newest_first() {
        let items = parse_feed(RSS_FIXTURE.as_bytes(), "example.com").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Newer post");
        assert_eq!(items[1].title, "Older post");
        assert_eq!(items[0].source, "example.com");
        assert!(items[0].published_at.unwrap() > items[1].published_at.unwrap());
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(parse_feed(b"this is not xml", "junk").is_err());
    }

    #[test]
    fn test_source_label() {
        assert_eq!(source_label("https://blog.example.com/feed.xml"), "blog.example.com");
        assert_eq!(source_label("not a url"), "not a url");
    }

    #[tokio::test]
    async fn test_aggregate_swallows_failing_sources() {
        // Unresolvable hosts fail fast; the aggregate call must still
        // succeed with zero items rather than propagate the error.
        let config = FeedsConfig {
            sources: vec!["http://feed.invalid./rss".to_string()],
            items_per_source: 5,
            fetch_timeout_secs: 1,
        };
        let aggregator = FeedAggregator::new(config);
        let items = aggregator.aggregate().await.unwrap();
        assert!(items.is_empty());
    }
}
