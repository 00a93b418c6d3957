//! Geo/ISP context enrichment for extracted network indicators.
//!
//! Lookup failure degrades the record to `"unknown"` sentinels; it never
//! blocks scoring or export.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

pub const UNKNOWN: &str = "unknown";

/// Typed enrichment payload with explicit sentinels instead of optional
/// fields the consumers would have to default everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRecord {
    pub location: String,
    pub isp: String,
    pub reputation: String,
}

impl EnrichmentRecord {
    pub fn unknown() -> Self {
        Self {
            location: UNKNOWN.to_string(),
            isp: UNKNOWN.to_string(),
            reputation: UNKNOWN.to_string(),
        }
    }
}

pub trait IpContextSource {
    fn lookup(&self, ip: &str) -> EnrichmentRecord;
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: Option<String>,
    city: Option<String>,
    country: Option<String>,
    isp: Option<String>,
}

/// ip-api style lookup over blocking HTTP.
pub struct HttpIpContextSource {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpIpContextSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Option<Self> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return None;
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .ok()?;
        Some(Self { client, endpoint })
    }
}

impl IpContextSource for HttpIpContextSource {
    fn lookup(&self, ip: &str) -> EnrichmentRecord {
        let url = format!("{}{}", self.endpoint, ip);
        let resp = match self.client.get(&url).send().and_then(|r| r.error_for_status()) {
            Ok(r) => r,
            Err(e) => {
                warn!(ip, error = %e, "geo lookup failed, using sentinels");
                return EnrichmentRecord::unknown();
            }
        };

        let body: GeoResponse = match resp.json() {
            Ok(b) => b,
            Err(e) => {
                warn!(ip, error = %e, "geo response unparsable, using sentinels");
                return EnrichmentRecord::unknown();
            }
        };

        if body.status.as_deref() != Some("success") {
            return EnrichmentRecord::unknown();
        }

        let location = match (body.city, body.country) {
            (Some(city), Some(country)) => format!("{city}, {country}"),
            (None, Some(country)) => country,
            _ => UNKNOWN.to_string(),
        };

        EnrichmentRecord {
            location,
            isp: body.isp.unwrap_or_else(|| UNKNOWN.to_string()),
            reputation: UNKNOWN.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_record_uses_sentinels() {
        let rec = EnrichmentRecord::unknown();
        assert_eq!(rec.location, UNKNOWN);
        assert_eq!(rec.isp, UNKNOWN);
        assert_eq!(rec.reputation, UNKNOWN);
    }

    #[test]
    fn empty_endpoint_disables_enrichment() {
        assert!(HttpIpContextSource::new("", Duration::from_secs(5)).is_none());
    }
}
