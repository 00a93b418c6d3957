//! Shared types for the Vigil threat-intelligence pipeline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub mod config;

pub use config::VigilConfig;

/// One normalized advisory pulled from an external feed.
///
/// `id` is unique within its source and is the only part of an item that
/// outlives a run (it migrates into the dedup state on commit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub source: String,
    pub published_at: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum IndicatorKind {
    Ipv4,
    Domain,
    Hash,
    Cve,
    RegistryKey,
    Artifact,
    CampaignUrl,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Ipv4 => "ipv4",
            IndicatorKind::Domain => "domain",
            IndicatorKind::Hash => "hash",
            IndicatorKind::Cve => "cve",
            IndicatorKind::RegistryKey => "registry_key",
            IndicatorKind::Artifact => "artifact",
            IndicatorKind::CampaignUrl => "campaign_url",
        }
    }
}

/// Extracted indicators for one run's corpus.
///
/// Values are unique per kind and iteration order is deterministic.
/// Kinds with zero matches are omitted entirely (never present-but-empty).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    kinds: BTreeMap<IndicatorKind, BTreeSet<String>>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: IndicatorKind, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.kinds.entry(kind).or_default().insert(value);
    }

    pub fn values(&self, kind: IndicatorKind) -> Option<&BTreeSet<String>> {
        self.kinds.get(&kind)
    }

    pub fn contains(&self, kind: IndicatorKind, value: &str) -> bool {
        self.kinds.get(&kind).is_some_and(|s| s.contains(value))
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Total number of indicator values across all kinds.
    pub fn len(&self) -> usize {
        self.kinds.values().map(|s| s.len()).sum()
    }

    pub fn kinds(&self) -> impl Iterator<Item = IndicatorKind> + '_ {
        self.kinds.keys().copied()
    }

    /// Iterate `(kind, value)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (IndicatorKind, &str)> {
        self.kinds
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (*k, v.as_str())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        }
    }
}

/// Score at or above which a run is labeled CRITICAL.
pub const CRITICAL_THRESHOLD: f64 = 8.5;
/// Score at or above which a run is labeled HIGH.
pub const HIGH_THRESHOLD: f64 = 6.5;
/// Score at or above which a run is labeled MEDIUM.
pub const MEDIUM_THRESHOLD: f64 = 4.0;

/// Label cut points. Deployments may tighten or loosen them through
/// configuration; the defaults are the shared constants above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: CRITICAL_THRESHOLD,
            high: HIGH_THRESHOLD,
            medium: MEDIUM_THRESHOLD,
        }
    }
}

impl RiskThresholds {
    /// Labels partition `[0.0, 10.0]` with no gaps or overlaps.
    pub fn label(&self, score: f64) -> RiskLabel {
        if score >= self.critical {
            RiskLabel::Critical
        } else if score >= self.high {
            RiskLabel::High
        } else if score >= self.medium {
            RiskLabel::Medium
        } else {
            RiskLabel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLabel {
    /// Label under the default thresholds.
    pub fn from_score(score: f64) -> Self {
        RiskThresholds::default().label(score)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Critical => "CRITICAL",
            RiskLabel::High => "HIGH",
            RiskLabel::Medium => "MEDIUM",
            RiskLabel::Low => "LOW",
        }
    }
}

/// Composite severity judgment for one run. Immutable once computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub label: RiskLabel,
    pub contributing_factors: Vec<String>,
}

/// Best-effort attribution, embedded in the published report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorAssessment {
    pub tracking_id: String,
    pub aliases: Vec<String>,
    pub origin: String,
    pub motivation: String,
    pub tooling: Vec<String>,
    pub confidence: Confidence,
}

/// External severity metrics for the run's vulnerabilities, when the
/// upstream lookups succeeded. Absent values contribute nothing to the
/// score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExternalSignals {
    pub cvss: Option<f64>,
    pub epss: Option<f64>,
    pub kev_listed: bool,
}

/// A matched ATT&CK technique from the keyword trigger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueMatch {
    pub technique_id: String,
    pub name: String,
    pub tactic: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_set_dedups_within_kind() {
        let mut set = IndicatorSet::new();
        set.insert(IndicatorKind::Ipv4, "8.8.8.8");
        set.insert(IndicatorKind::Ipv4, "8.8.8.8");
        set.insert(IndicatorKind::Ipv4, "1.1.1.1");
        assert_eq!(set.values(IndicatorKind::Ipv4).unwrap().len(), 2);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn indicator_set_omits_empty_kinds() {
        let set = IndicatorSet::new();
        assert!(set.values(IndicatorKind::Domain).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn labels_partition_score_range() {
        assert_eq!(RiskLabel::from_score(0.0), RiskLabel::Low);
        assert_eq!(RiskLabel::from_score(3.999), RiskLabel::Low);
        assert_eq!(RiskLabel::from_score(4.0), RiskLabel::Medium);
        assert_eq!(RiskLabel::from_score(6.5), RiskLabel::High);
        assert_eq!(RiskLabel::from_score(8.5), RiskLabel::Critical);
        assert_eq!(RiskLabel::from_score(10.0), RiskLabel::Critical);
    }

    #[test]
    fn custom_thresholds_shift_labels() {
        let strict = RiskThresholds {
            critical: 6.0,
            high: 4.0,
            medium: 2.0,
        };
        assert_eq!(strict.label(6.0), RiskLabel::Critical);
        assert_eq!(strict.label(4.5), RiskLabel::High);
        assert_eq!(strict.label(1.9), RiskLabel::Low);
        // Defaults stay aligned with the shared constants.
        assert_eq!(RiskThresholds::default().label(8.5), RiskLabel::Critical);
        assert_eq!(
            RiskThresholds::default().label(7.0),
            RiskLabel::from_score(7.0)
        );
    }

    #[test]
    fn label_is_deterministic() {
        for s in [0.0, 2.5, 4.0, 5.1, 6.5, 7.9, 8.5, 9.9] {
            assert_eq!(RiskLabel::from_score(s), RiskLabel::from_score(s));
        }
    }
}
