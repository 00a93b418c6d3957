//! Runtime configuration, constructed once at process start.
//!
//! Every knob the pipeline reads lives here; nothing consults the
//! environment after construction.

use std::path::PathBuf;
use std::time::Duration;

use crate::RiskThresholds;

const DEFAULT_SOURCES: &[&str] = &[
    "https://thehackernews.com/feeds/posts/default",
    "https://feeds.feedburner.com/Securityweek",
    "https://krebsonsecurity.com/feed/",
    "https://www.bleepingcomputer.com/feed/",
];

pub const DEFAULT_MAX_STATE_SIZE: usize = 1500;
pub const DEFAULT_MAX_PER_FEED: usize = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PUBLISH_RETRY_MAX: u32 = 3;
pub const DEFAULT_PUBLISH_RETRY_DELAY_SECS: u64 = 10;
pub const DEFAULT_MANIFEST_MAX_ENTRIES: usize = 30;

#[derive(Debug, Clone)]
pub struct VigilConfig {
    /// RSS advisory sources, fetched independently.
    pub sources: Vec<String>,
    pub max_per_feed: usize,
    pub state_file: PathBuf,
    pub max_state_size: usize,
    pub export_dir: PathBuf,
    pub manifest_max_entries: usize,
    pub http_timeout: Duration,
    pub publish_endpoint: String,
    pub publish_token: String,
    pub publish_retry_max: u32,
    pub publish_retry_delay: Duration,
    /// Label cut points for the composite risk score.
    pub risk_thresholds: RiskThresholds,
    /// Optional alert webhook URLs, fire-and-forget.
    pub alert_webhooks: Vec<String>,
    /// Optional social share endpoint; empty disables the broadcast.
    pub social_endpoint: String,
    pub social_token: String,
    /// Geo/ISP context endpoint; empty disables enrichment.
    pub geo_endpoint: String,
    /// CISA KEV catalog URL; empty disables the KEV bonus signal.
    pub kev_url: String,
    /// FIRST EPSS API URL; empty disables the EPSS signal.
    pub epss_url: String,
    /// NVD CVE API URL; empty disables the CVSS signal.
    pub nvd_url: String,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            max_per_feed: DEFAULT_MAX_PER_FEED,
            state_file: PathBuf::from("data/processed.json"),
            max_state_size: DEFAULT_MAX_STATE_SIZE,
            export_dir: PathBuf::from("exports"),
            manifest_max_entries: DEFAULT_MANIFEST_MAX_ENTRIES,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            publish_endpoint: String::new(),
            publish_token: String::new(),
            publish_retry_max: DEFAULT_PUBLISH_RETRY_MAX,
            publish_retry_delay: Duration::from_secs(DEFAULT_PUBLISH_RETRY_DELAY_SECS),
            risk_thresholds: RiskThresholds::default(),
            alert_webhooks: Vec::new(),
            social_endpoint: String::new(),
            social_token: String::new(),
            geo_endpoint: "http://ip-api.com/json/".to_string(),
            kev_url:
                "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json"
                    .to_string(),
            epss_url: "https://api.first.org/data/v1/epss".to_string(),
            nvd_url: "https://services.nvd.nist.gov/rest/json/cves/2.0".to_string(),
        }
    }
}

impl VigilConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// `VIGIL_SOURCES` is a comma-separated URL list.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(sources) = env_string("VIGIL_SOURCES") {
            cfg.sources = sources
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(n) = env_parse("VIGIL_MAX_PER_FEED") {
            cfg.max_per_feed = n;
        }
        if let Some(p) = env_string("VIGIL_STATE_FILE") {
            cfg.state_file = PathBuf::from(p);
        }
        if let Some(n) = env_parse("VIGIL_MAX_STATE_SIZE") {
            cfg.max_state_size = n;
        }
        if let Some(p) = env_string("VIGIL_EXPORT_DIR") {
            cfg.export_dir = PathBuf::from(p);
        }
        if let Some(n) = env_parse("VIGIL_MANIFEST_MAX_ENTRIES") {
            cfg.manifest_max_entries = n;
        }
        if let Some(n) = env_parse::<u64>("VIGIL_HTTP_TIMEOUT_SECS") {
            cfg.http_timeout = Duration::from_secs(n);
        }
        if let Some(s) = env_string("VIGIL_PUBLISH_ENDPOINT") {
            cfg.publish_endpoint = s;
        }
        if let Some(s) = env_string("VIGIL_PUBLISH_TOKEN") {
            cfg.publish_token = s;
        }
        if let Some(n) = env_parse("VIGIL_PUBLISH_RETRY_MAX") {
            cfg.publish_retry_max = n;
        }
        if let Some(n) = env_parse::<u64>("VIGIL_PUBLISH_RETRY_DELAY_SECS") {
            cfg.publish_retry_delay = Duration::from_secs(n);
        }
        if let Some(v) = env_parse("VIGIL_CRITICAL_THRESHOLD") {
            cfg.risk_thresholds.critical = v;
        }
        if let Some(v) = env_parse("VIGIL_HIGH_THRESHOLD") {
            cfg.risk_thresholds.high = v;
        }
        if let Some(v) = env_parse("VIGIL_MEDIUM_THRESHOLD") {
            cfg.risk_thresholds.medium = v;
        }
        if let Some(s) = env_string("VIGIL_ALERT_WEBHOOKS") {
            cfg.alert_webhooks = s
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(s) = env_string("VIGIL_SOCIAL_ENDPOINT") {
            cfg.social_endpoint = s;
        }
        if let Some(s) = env_string("VIGIL_SOCIAL_TOKEN") {
            cfg.social_token = s;
        }
        if let Some(s) = env_string("VIGIL_GEO_ENDPOINT") {
            cfg.geo_endpoint = s;
        }
        if let Some(s) = env_string("VIGIL_KEV_URL") {
            cfg.kev_url = s;
        }
        if let Some(s) = env_string("VIGIL_EPSS_URL") {
            cfg.epss_url = s;
        }
        if let Some(s) = env_string("VIGIL_NVD_URL") {
            cfg.nvd_url = s;
        }

        cfg
    }
}

fn env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_settings() {
        let cfg = VigilConfig::default();
        assert_eq!(cfg.max_state_size, 1500);
        assert_eq!(cfg.max_per_feed, 5);
        assert_eq!(cfg.publish_retry_max, 3);
        assert_eq!(cfg.publish_retry_delay, Duration::from_secs(10));
        assert!(!cfg.sources.is_empty());
        assert_eq!(cfg.risk_thresholds, RiskThresholds::default());
        // Social broadcast is opt-in.
        assert!(cfg.social_endpoint.is_empty());
        assert!(cfg.social_token.is_empty());
    }
}
