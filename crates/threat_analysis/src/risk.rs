//! Risk Scoring Engine.
//!
//! Additive model: a base value plus fixed weights per signal, clamped to
//! `[0.0, 10.0]`. Every weight is positive, so adding a signal can never
//! lower the score. The label comes from the shared threshold constants in
//! `vigil_core`.

use vigil_core::{IndicatorSet, RiskAssessment, RiskThresholds, TechniqueMatch};

pub use vigil_core::ExternalSignals;

pub const BASE_SCORE: f64 = 2.0;
pub const CRITICAL_KEYWORD_WEIGHT: f64 = 3.0;
pub const HIGH_KEYWORD_WEIGHT: f64 = 1.0;
pub const VOLUME_LOW_THRESHOLD: usize = 5;
pub const VOLUME_LOW_BONUS: f64 = 0.5;
pub const VOLUME_HIGH_THRESHOLD: usize = 15;
pub const VOLUME_HIGH_BONUS: f64 = 1.0;
pub const TECHNIQUE_WEIGHT: f64 = 0.4;
pub const CVSS_WEIGHT: f64 = 0.3;
pub const EPSS_WEIGHT: f64 = 2.0;
pub const KEV_BONUS: f64 = 1.5;
pub const MAX_SCORE: f64 = 10.0;

const CRITICAL_KEYWORDS: &[&str] = &[
    "zero-day",
    "zero day",
    "actively exploited",
    "in the wild",
    "under active exploitation",
];

const HIGH_KEYWORDS: &[&str] = &[
    "ransomware",
    "exploit",
    "backdoor",
    "data breach",
    "remote code execution",
    "supply chain",
];

#[derive(Debug, Default)]
pub struct RiskEngine {
    thresholds: RiskThresholds,
}

impl RiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Pure function of its inputs; records each contributing factor in
    /// the order it was applied.
    pub fn score(
        &self,
        headline: &str,
        corpus: &str,
        indicators: &IndicatorSet,
        techniques: &[TechniqueMatch],
        signals: &ExternalSignals,
    ) -> RiskAssessment {
        let text = format!("{} {}", headline, corpus).to_lowercase();
        let mut score = BASE_SCORE;
        let mut factors = vec![format!("base {BASE_SCORE:.1}")];

        for kw in CRITICAL_KEYWORDS {
            if text.contains(kw) {
                score += CRITICAL_KEYWORD_WEIGHT;
                factors.push(format!("critical keyword '{kw}' +{CRITICAL_KEYWORD_WEIGHT:.1}"));
            }
        }
        for kw in HIGH_KEYWORDS {
            if text.contains(kw) {
                score += HIGH_KEYWORD_WEIGHT;
                factors.push(format!("high keyword '{kw}' +{HIGH_KEYWORD_WEIGHT:.1}"));
            }
        }

        let volume = indicators.len();
        if volume >= VOLUME_LOW_THRESHOLD {
            score += VOLUME_LOW_BONUS;
            factors.push(format!("indicator volume >= {VOLUME_LOW_THRESHOLD} +{VOLUME_LOW_BONUS:.1}"));
        }
        if volume >= VOLUME_HIGH_THRESHOLD {
            score += VOLUME_HIGH_BONUS;
            factors.push(format!("indicator volume >= {VOLUME_HIGH_THRESHOLD} +{VOLUME_HIGH_BONUS:.1}"));
        }

        if !techniques.is_empty() {
            let bonus = TECHNIQUE_WEIGHT * techniques.len() as f64;
            score += bonus;
            factors.push(format!("{} technique matches +{bonus:.1}", techniques.len()));
        }

        if let Some(cvss) = signals.cvss {
            let bonus = cvss.clamp(0.0, 10.0) * CVSS_WEIGHT;
            score += bonus;
            factors.push(format!("cvss {cvss:.1} +{bonus:.1}"));
        }
        if let Some(epss) = signals.epss {
            let bonus = epss.clamp(0.0, 1.0) * EPSS_WEIGHT;
            score += bonus;
            factors.push(format!("epss {epss:.2} +{bonus:.1}"));
        }
        if signals.kev_listed {
            score += KEV_BONUS;
            factors.push(format!("KEV listed +{KEV_BONUS:.1}"));
        }

        let score = score.clamp(0.0, MAX_SCORE);
        RiskAssessment {
            score,
            label: self.thresholds.label(score),
            contributing_factors: factors,
        }
    }
}
