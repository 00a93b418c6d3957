//! Feed Aggregator: pulls raw advisories from independent RSS sources and
//! normalizes them into `IntelItem`s.
//!
//! A malformed or unreachable source contributes zero items and never
//! aborts the batch. If every source fails, the run simply sees no new
//! intelligence.

use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use vigil_core::IntelItem;

pub mod signals;

pub use signals::{FeedSignalSource, NullSignalSource, SignalSource};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("feed parse failed for {url}: {reason}")]
    Parse { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Transport seam: tests inject fixture bytes instead of live HTTP.
pub trait FeedFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher with a bounded per-request timeout.
pub struct HttpFeedFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("vigil-intel/0.1")
            .build()
            .map_err(|e| FeedError::Fetch {
                url: String::new(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl FeedFetch for HttpFeedFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FeedError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(FeedError::Fetch {
                url: url.to_string(),
                reason: format!("http status {}", resp.status()),
            });
        }
        resp.bytes().map(|b| b.to_vec()).map_err(|e| FeedError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

pub struct FeedAggregator<F: FeedFetch> {
    fetcher: F,
}

impl<F: FeedFetch> FeedAggregator<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Fetch and normalize every source, tolerating per-source failure.
    ///
    /// Within a source, items keep feed order, capped at `per_source_cap`.
    /// No ordering is guaranteed across sources.
    pub fn collect(&self, sources: &[String], per_source_cap: usize) -> Vec<IntelItem> {
        let mut items = Vec::new();
        for url in sources {
            match self.collect_one(url, per_source_cap) {
                Ok(mut batch) => {
                    debug!(source = %url, count = batch.len(), "source contributed items");
                    items.append(&mut batch);
                }
                Err(e) => {
                    warn!(source = %url, error = %e, "source degraded to zero items");
                }
            }
        }
        items
    }

    fn collect_one(&self, url: &str, cap: usize) -> Result<Vec<IntelItem>> {
        let bytes = self.fetcher.fetch(url)?;
        let channel = rss::Channel::read_from(&bytes[..]).map_err(|e| FeedError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let source = if channel.title().is_empty() {
            url.to_string()
        } else {
            channel.title().to_string()
        };

        Ok(channel
            .items()
            .iter()
            .take(cap)
            .map(|item| normalize_item(item, &source))
            .collect())
    }
}

fn normalize_item(item: &rss::Item, source: &str) -> IntelItem {
    let title = item.title().unwrap_or("(untitled)").to_string();
    let link = item.link().unwrap_or_default().to_string();
    let id = item
        .guid()
        .map(|g| g.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| (!link.is_empty()).then(|| link.clone()))
        .unwrap_or_else(|| title_digest(&title));

    IntelItem {
        id,
        title,
        link,
        summary: item.description().unwrap_or_default().to_string(),
        source: source.to_string(),
        published_at: item.pub_date().map(|s| s.to_string()),
    }
}

/// Last-resort id for items carrying neither guid nor link.
fn title_digest(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureFetcher {
        body: &'static str,
    }

    impl FeedFetch for FixtureFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.body.as_bytes().to_vec())
        }
    }

    struct FailingFetcher;

    impl FeedFetch for FailingFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(FeedError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test Advisories</title>
    <link>https://example.com</link>
    <description>fixture</description>
    <item>
      <title>First advisory</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <description>Ransomware campaign observed.</description>
    </item>
    <item>
      <title>Second advisory</title>
      <link>https://example.com/2</link>
      <description>Phishing wave.</description>
    </item>
    <item>
      <title>Third advisory</title>
      <link>https://example.com/3</link>
      <description>Patch released.</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_and_caps_items() {
        let agg = FeedAggregator::new(FixtureFetcher { body: SAMPLE_FEED });
        let items = agg.collect(&["https://example.com/feed".to_string()], 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "guid-1");
        assert_eq!(items[0].source, "Test Advisories");
        // Feed order is preserved within a source.
        assert_eq!(items[1].title, "Second advisory");
        // Missing guid falls back to the link.
        assert_eq!(items[1].id, "https://example.com/2");
    }

    #[test]
    fn failing_source_contributes_zero_items() {
        let agg = FeedAggregator::new(FailingFetcher);
        let items = agg.collect(&["https://down.example.com/feed".to_string()], 5);
        assert!(items.is_empty());
    }

    #[test]
    fn malformed_feed_is_nonfatal() {
        let agg = FeedAggregator::new(FixtureFetcher { body: "<not-rss>" });
        let items = agg.collect(&["https://example.com/feed".to_string()], 5);
        assert!(items.is_empty());
    }
}
