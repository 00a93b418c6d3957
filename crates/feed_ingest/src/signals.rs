//! External severity signal lookups: CISA KEV membership, FIRST EPSS
//! probability, and NVD CVSS base scores for the run's CVEs.
//!
//! Every lookup is best-effort: a failed or disabled source degrades that
//! signal to absent, never the run.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;
use vigil_core::ExternalSignals;

use crate::FeedFetch;

/// How many CVEs get an individual NVD lookup before we stop. The NVD API
/// is rate limited and one run rarely needs more.
const NVD_LOOKUP_CAP: usize = 3;

pub trait SignalSource {
    fn lookup(&self, cve_ids: &BTreeSet<String>) -> ExternalSignals;
}

/// No-op source for disabled configurations and tests.
#[derive(Debug, Default)]
pub struct NullSignalSource;

impl SignalSource for NullSignalSource {
    fn lookup(&self, _cve_ids: &BTreeSet<String>) -> ExternalSignals {
        ExternalSignals::default()
    }
}

pub struct FeedSignalSource<F: FeedFetch> {
    fetcher: F,
    kev_url: String,
    epss_url: String,
    nvd_url: String,
}

impl<F: FeedFetch> FeedSignalSource<F> {
    pub fn new(
        fetcher: F,
        kev_url: impl Into<String>,
        epss_url: impl Into<String>,
        nvd_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            kev_url: kev_url.into(),
            epss_url: epss_url.into(),
            nvd_url: nvd_url.into(),
        }
    }

    fn fetch_json(&self, url: &str) -> Option<Value> {
        match self.fetcher.fetch(url) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(url, error = %e, "signal payload unparsable");
                    None
                }
            },
            Err(e) => {
                warn!(url, error = %e, "signal fetch failed");
                None
            }
        }
    }

    fn kev_listed(&self, cve_ids: &BTreeSet<String>) -> bool {
        if self.kev_url.is_empty() || cve_ids.is_empty() {
            return false;
        }
        let Some(payload) = self.fetch_json(&self.kev_url) else {
            return false;
        };
        payload["vulnerabilities"]
            .as_array()
            .map(|vulns| {
                vulns.iter().any(|v| {
                    v["cveID"]
                        .as_str()
                        .is_some_and(|id| cve_ids.contains(id))
                })
            })
            .unwrap_or(false)
    }

    /// Highest EPSS probability across the run's CVEs.
    fn max_epss(&self, cve_ids: &BTreeSet<String>) -> Option<f64> {
        if self.epss_url.is_empty() || cve_ids.is_empty() {
            return None;
        }
        let joined = cve_ids.iter().cloned().collect::<Vec<_>>().join(",");
        let payload = self.fetch_json(&format!("{}?cve={}", self.epss_url, joined))?;
        payload["data"]
            .as_array()?
            .iter()
            .filter_map(|item| {
                item["epss"]
                    .as_str()
                    .and_then(|s| s.parse::<f64>().ok())
                    .or_else(|| item["epss"].as_f64())
            })
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Highest CVSS base score among the first few CVEs.
    fn max_cvss(&self, cve_ids: &BTreeSet<String>) -> Option<f64> {
        if self.nvd_url.is_empty() {
            return None;
        }
        let mut best: Option<f64> = None;
        for cve_id in cve_ids.iter().take(NVD_LOOKUP_CAP) {
            let Some(payload) = self.fetch_json(&format!("{}?cveId={}", self.nvd_url, cve_id))
            else {
                continue;
            };
            if let Some(score) = extract_cvss(&payload) {
                best = Some(best.map_or(score, |b| b.max(score)));
            }
        }
        best
    }
}

fn extract_cvss(payload: &Value) -> Option<f64> {
    let metrics = &payload["vulnerabilities"].as_array()?.first()?["cve"]["metrics"];
    for key in ["cvssMetricV31", "cvssMetricV30", "cvssMetricV2"] {
        if let Some(score) = metrics[key]
            .as_array()
            .and_then(|m| m.first())
            .and_then(|m| m["cvssData"]["baseScore"].as_f64())
        {
            return Some(score);
        }
    }
    None
}

impl<F: FeedFetch> SignalSource for FeedSignalSource<F> {
    fn lookup(&self, cve_ids: &BTreeSet<String>) -> ExternalSignals {
        ExternalSignals {
            cvss: self.max_cvss(cve_ids),
            epss: self.max_epss(cve_ids),
            kev_listed: self.kev_listed(cve_ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeedError, Result};

    struct JsonFetcher;

    impl FeedFetch for JsonFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let body = if url.contains("kev") {
                r#"{"vulnerabilities": [{"cveID": "CVE-2024-12345"}, {"cveID": "CVE-2023-0001"}]}"#
            } else if url.contains("epss") {
                r#"{"data": [{"cve": "CVE-2024-12345", "epss": "0.72"}]}"#
            } else if url.contains("nvd") {
                r#"{"vulnerabilities": [{"cve": {"metrics": {"cvssMetricV31": [{"cvssData": {"baseScore": 9.8}}]}}}]}"#
            } else {
                return Err(FeedError::Fetch {
                    url: url.to_string(),
                    reason: "unexpected url".into(),
                });
            };
            Ok(body.as_bytes().to_vec())
        }
    }

    fn cves(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn combines_all_three_signals() {
        let source = FeedSignalSource::new(
            JsonFetcher,
            "https://example.com/kev.json",
            "https://example.com/epss",
            "https://example.com/nvd",
        );
        let signals = source.lookup(&cves(&["CVE-2024-12345"]));
        assert!(signals.kev_listed);
        assert_eq!(signals.epss, Some(0.72));
        assert_eq!(signals.cvss, Some(9.8));
    }

    #[test]
    fn unlisted_cve_is_not_kev() {
        let source = FeedSignalSource::new(
            JsonFetcher,
            "https://example.com/kev.json",
            "",
            "",
        );
        let signals = source.lookup(&cves(&["CVE-2020-9999"]));
        assert!(!signals.kev_listed);
        assert_eq!(signals.epss, None);
        assert_eq!(signals.cvss, None);
    }

    struct DownFetcher;

    impl FeedFetch for DownFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(FeedError::Fetch {
                url: url.to_string(),
                reason: "timeout".into(),
            })
        }
    }

    #[test]
    fn failed_lookups_degrade_to_absent() {
        let source = FeedSignalSource::new(
            DownFetcher,
            "https://example.com/kev.json",
            "https://example.com/epss",
            "https://example.com/nvd",
        );
        let signals = source.lookup(&cves(&["CVE-2024-12345"]));
        assert_eq!(signals, ExternalSignals::default());
    }
}
