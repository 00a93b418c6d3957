//! Downstream notification collaborators.
//!
//! Fire-and-forget by contract: a notifier failure is logged and dropped,
//! never allowed to affect the pipeline outcome.

use std::time::Duration;

use tracing::{info, warn};
use vigil_core::{RiskLabel, RiskThresholds};

pub trait Notifier {
    fn notify(&self, headline: &str, risk_score: f64, post_url: &str);
}

fn severity_marker(thresholds: &RiskThresholds, score: f64) -> &'static str {
    match thresholds.label(score) {
        RiskLabel::Critical => "[CRITICAL]",
        RiskLabel::High => "[HIGH]",
        _ => "[NOTICE]",
    }
}

/// Posts a JSON alert to each configured webhook.
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    webhooks: Vec<String>,
    thresholds: RiskThresholds,
}

impl WebhookNotifier {
    pub fn new(
        webhooks: Vec<String>,
        thresholds: RiskThresholds,
        timeout: Duration,
    ) -> Option<Self> {
        if webhooks.is_empty() {
            return None;
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .ok()?;
        Some(Self {
            client,
            webhooks,
            thresholds,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, headline: &str, risk_score: f64, post_url: &str) {
        let label = self.thresholds.label(risk_score);
        let payload = serde_json::json!({
            "title": format!("{} {}", severity_marker(&self.thresholds, risk_score), headline),
            "risk_score": risk_score,
            "label": label.as_str(),
            "classification": "TLP:CLEAR",
            "url": post_url,
        });

        for webhook in &self.webhooks {
            match self.client.post(webhook).json(&payload).send() {
                Ok(resp) if resp.status().is_success() => {
                    info!(webhook = %webhook, "alert dispatched");
                }
                Ok(resp) => {
                    warn!(webhook = %webhook, status = %resp.status(), "alert webhook rejected payload");
                }
                Err(e) => {
                    warn!(webhook = %webhook, error = %e, "alert dispatch failed");
                }
            }
        }
    }
}

/// Composes the social advisory text and posts it to a share endpoint.
pub struct SocialBroadcaster {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
    thresholds: RiskThresholds,
}

impl SocialBroadcaster {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        thresholds: RiskThresholds,
        timeout: Duration,
    ) -> Option<Self> {
        let endpoint = endpoint.into();
        let token = token.into();
        if endpoint.is_empty() || token.is_empty() {
            return None;
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .ok()?;
        Some(Self {
            client,
            endpoint,
            token,
            thresholds,
        })
    }

    fn advisory_text(&self, headline: &str, risk_score: f64, post_url: &str) -> String {
        format!(
            "{} THREAT ADVISORY\nTHREAT: {}\nRISK INDEX: {:.1}/10.0\nAnalysis: {}",
            severity_marker(&self.thresholds, risk_score),
            headline,
            risk_score,
            post_url
        )
    }
}

impl Notifier for SocialBroadcaster {
    fn notify(&self, headline: &str, risk_score: f64, post_url: &str) {
        let payload = serde_json::json!({
            "text": self.advisory_text(headline, risk_score, post_url),
            "link": post_url,
        });
        match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
        {
            Ok(resp) if resp.status().is_success() => {
                info!("social broadcast dispatched");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "social broadcast rejected");
            }
            Err(e) => {
                warn!(error = %e, "social broadcast failed");
            }
        }
    }
}
