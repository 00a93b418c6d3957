//! Actor Correlation Engine.
//!
//! Heuristic attribution only: a case-insensitive substring match of a
//! known alias inside the run's corpus assigns a tracking id. The table is
//! ordered and first match wins; overlapping aliases across entries are a
//! configuration error (asserted by a test), not a runtime concern.

use vigil_core::{ActorAssessment, Confidence, IndicatorSet};

/// Tracking id returned when no alias matches.
pub const UNKNOWN_CLUSTER_ID: &str = "UNC-VGL-99";

struct ActorProfile {
    tracking_id: &'static str,
    aliases: &'static [&'static str],
    origin: &'static str,
    motivation: &'static str,
    tooling: &'static [&'static str],
    confidence: Confidence,
}

const ACTOR_TABLE: &[ActorProfile] = &[
    ActorProfile {
        tracking_id: "VGL-APT-22",
        aliases: &["Volt Typhoon", "Vanguard Panda"],
        origin: "East Asia",
        motivation: "Critical Infrastructure Espionage",
        tooling: &["Living-off-the-land", "KV-Botnet"],
        confidence: Confidence::High,
    },
    ActorProfile {
        tracking_id: "VGL-FIN-09",
        aliases: &["Lazarus", "Hidden Cobra"],
        origin: "North Asia",
        motivation: "Financial Gain",
        tooling: &["FastCash", "AppleJeus"],
        confidence: Confidence::Medium,
    },
    ActorProfile {
        tracking_id: "VGL-CRM-31",
        aliases: &["LockBit", "Bitwise Spider"],
        origin: "Eastern Europe",
        motivation: "Ransomware Extortion",
        tooling: &["StealBit", "LockBit Black"],
        confidence: Confidence::Medium,
    },
];

#[derive(Debug, Default)]
pub struct ActorMatrix;

impl ActorMatrix {
    pub fn new() -> Self {
        Self
    }

    /// Assign a tracking id from the first alias found in `corpus`.
    ///
    /// Never fails: an unmatched corpus maps to the unknown cluster with
    /// LOW confidence and placeholder profile fields. The indicator set is
    /// accepted for future multi-signal corroboration but unused today.
    pub fn correlate(&self, corpus: &str, _indicators: &IndicatorSet) -> ActorAssessment {
        let lower = corpus.to_lowercase();

        for profile in ACTOR_TABLE {
            if profile
                .aliases
                .iter()
                .any(|alias| lower.contains(&alias.to_lowercase()))
            {
                return ActorAssessment {
                    tracking_id: profile.tracking_id.to_string(),
                    aliases: profile.aliases.iter().map(|a| a.to_string()).collect(),
                    origin: profile.origin.to_string(),
                    motivation: profile.motivation.to_string(),
                    tooling: profile.tooling.iter().map(|t| t.to_string()).collect(),
                    confidence: profile.confidence,
                };
            }
        }

        ActorAssessment {
            tracking_id: UNKNOWN_CLUSTER_ID.to_string(),
            aliases: vec!["Unknown Cluster".to_string()],
            origin: "Under Investigation".to_string(),
            motivation: "Undetermined".to_string(),
            tooling: vec!["Under Analysis".to_string()],
            confidence: Confidence::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn alias_match_is_case_insensitive() {
        let matrix = ActorMatrix::new();
        let set = IndicatorSet::new();
        let hit = matrix.correlate("activity linked to VOLT TYPHOON infrastructure", &set);
        assert_eq!(hit.tracking_id, "VGL-APT-22");
        assert_eq!(hit.confidence, Confidence::High);
    }

    #[test]
    fn no_match_yields_unknown_cluster() {
        let matrix = ActorMatrix::new();
        let set = IndicatorSet::new();
        let miss = matrix.correlate("generic phishing advisory", &set);
        assert_eq!(miss.tracking_id, UNKNOWN_CLUSTER_ID);
        assert_eq!(miss.confidence, Confidence::Low);
    }

    #[test]
    fn first_match_wins_in_table_order() {
        let matrix = ActorMatrix::new();
        let set = IndicatorSet::new();
        let hit = matrix.correlate("report mentions Lazarus and also Volt Typhoon", &set);
        assert_eq!(hit.tracking_id, "VGL-APT-22");
    }

    #[test]
    fn aliases_do_not_overlap_across_entries() {
        // Overlap would make attribution order-dependent in a way operators
        // cannot see. Treat it as a broken table, not a runtime case.
        let mut seen = HashSet::new();
        for profile in ACTOR_TABLE {
            for alias in profile.aliases {
                assert!(
                    seen.insert(alias.to_lowercase()),
                    "alias {alias} appears in more than one profile"
                );
            }
        }
    }
}
