//! Publication collaborators: the publish API client, the shared
//! retry-with-backoff utility, and fire-and-forget notifiers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

pub mod notify;
pub mod retry;

pub use notify::{Notifier, SocialBroadcaster, WebhookNotifier};
pub use retry::retry_with_backoff;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Rate limits, transient 5xx, network failures. Worth retrying.
    #[error("retryable publish failure: {0}")]
    Retryable(String),
    /// Auth failures and malformed requests. Retrying cannot help.
    #[error("terminal publish failure: {0}")]
    Terminal(String),
}

impl PublishError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Retryable(_))
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
    pub is_draft: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub url: String,
    pub title: String,
    pub published_at: Option<String>,
}

pub trait Publisher {
    fn publish(&self, request: &PublishRequest) -> Result<PublishedPost>;
}

/// Blocking HTTP client for the external publish API.
pub struct HttpPublisher {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Terminal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }
}

impl Publisher for HttpPublisher {
    fn publish(&self, request: &PublishRequest) -> Result<PublishedPost> {
        if self.endpoint.is_empty() {
            return Err(PublishError::Terminal("publish endpoint not configured".into()));
        }
        if request.title.is_empty() || request.content.is_empty() {
            return Err(PublishError::Terminal("title and content are required".into()));
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .map_err(|e| PublishError::Retryable(format!("network error: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            let post: PublishedPost = resp
                .json()
                .map_err(|e| PublishError::Terminal(format!("malformed publish response: {e}")))?;
            info!(url = %post.url, "post published");
            return Ok(post);
        }

        let body = resp.text().unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            warn!(%status, "publish returned retryable status");
            Err(PublishError::Retryable(format!("http {status}: {body}")))
        } else {
            error!(%status, "publish returned terminal status");
            Err(PublishError::Terminal(format!("http {status}: {body}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_is_terminal() {
        let publisher =
            HttpPublisher::new("", "tok", Duration::from_secs(5)).expect("client");
        let req = PublishRequest {
            title: "t".into(),
            content: "c".into(),
            labels: vec![],
            is_draft: false,
        };
        match publisher.publish(&req) {
            Err(PublishError::Terminal(_)) => {}
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[test]
    fn missing_fields_are_terminal() {
        let publisher =
            HttpPublisher::new("https://api.example.com/posts", "tok", Duration::from_secs(5))
                .expect("client");
        let req = PublishRequest {
            title: String::new(),
            content: "c".into(),
            labels: vec![],
            is_draft: false,
        };
        assert!(matches!(
            publisher.publish(&req),
            Err(PublishError::Terminal(_))
        ));
    }
}
