//! IOC Extraction Engine: table-driven pattern matching of free text into
//! typed indicator collections.
//!
//! Pure and offline: no network calls, deterministic for a given input.
//! HTML markup is stripped before matching so attribute values never leak
//! into results.

use regex::{Regex, RegexBuilder};
use vigil_core::{IndicatorKind, IndicatorSet};

pub mod enrich;

pub use enrich::{EnrichmentRecord, HttpIpContextSource, IpContextSource};

/// One matching rule in the extraction table.
struct PatternRule {
    kind: IndicatorKind,
    regex: Regex,
}

pub struct IocExtractor {
    rules: Vec<PatternRule>,
    html_tag: Regex,
}

impl Default for IocExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IocExtractor {
    pub fn new() -> Self {
        let table: &[(IndicatorKind, &str)] = &[
            (IndicatorKind::Ipv4, r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b"),
            (
                IndicatorKind::Domain,
                r"\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,6}\b",
            ),
            // MD5 and SHA-256 length classes share one kind.
            (IndicatorKind::Hash, r"\b[A-Fa-f0-9]{64}\b|\b[A-Fa-f0-9]{32}\b"),
            (IndicatorKind::Cve, r"CVE-\d{4}-\d{4,7}"),
            (
                IndicatorKind::RegistryKey,
                r"(?:HKLM|HKCU|HKEY_[A-Z_]+)\\(?:[\w .-]+\\)*(?:Run|RunOnce)(?:\\[\w .-]+)*",
            ),
            (
                IndicatorKind::Artifact,
                r"\b[\w-]+\.(?:exe|dll|zip|iso|bin)\b",
            ),
            // Campaign infrastructure: domain plus a known staging sub-path.
            (
                IndicatorKind::CampaignUrl,
                r"\b(?:[a-z0-9-]+\.)+[a-z]{2,6}/(?:gate|panel|c2|drop|upload)(?:/[\w.-]+)*\b",
            ),
        ];

        let rules = table
            .iter()
            .map(|(kind, pattern)| PatternRule {
                kind: *kind,
                regex: RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("extraction table pattern must compile"),
            })
            .collect();

        Self {
            rules,
            html_tag: Regex::new(r"<[^>]+>").expect("html tag pattern must compile"),
        }
    }

    /// Extract deduplicated indicators from `text`.
    ///
    /// Campaign-URL matches are additionally promoted into the Domain kind:
    /// they are network-observable infrastructure even though syntactically
    /// distinct from a bare domain.
    pub fn extract(&self, text: &str) -> IndicatorSet {
        let stripped = self.html_tag.replace_all(text, " ");

        let mut set = IndicatorSet::new();
        for rule in &self.rules {
            for m in rule.regex.find_iter(&stripped) {
                set.insert(rule.kind, m.as_str());
            }
        }

        let promoted: Vec<String> = set
            .values(IndicatorKind::CampaignUrl)
            .map(|vs| vs.iter().cloned().collect())
            .unwrap_or_default();
        for url in promoted {
            set.insert(IndicatorKind::Domain, url);
        }

        set
    }
}

/// Primary attack vector, judged from the kinds of indicators present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryVector {
    VulnerabilityExploitation,
    MalwarePayload,
    CommandAndControl,
    GeneralIntel,
}

impl PrimaryVector {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryVector::VulnerabilityExploitation => "Vulnerability Exploitation",
            PrimaryVector::MalwarePayload => "Malware Payload",
            PrimaryVector::CommandAndControl => "Command & Control / Phishing",
            PrimaryVector::GeneralIntel => "General Intel",
        }
    }
}

pub fn categorize(indicators: &IndicatorSet) -> PrimaryVector {
    if indicators.values(IndicatorKind::Cve).is_some() {
        PrimaryVector::VulnerabilityExploitation
    } else if indicators.values(IndicatorKind::Hash).is_some()
        || indicators.values(IndicatorKind::Artifact).is_some()
    {
        PrimaryVector::MalwarePayload
    } else if indicators.values(IndicatorKind::Ipv4).is_some()
        || indicators.values(IndicatorKind::Domain).is_some()
    {
        PrimaryVector::CommandAndControl
    } else {
        PrimaryVector::GeneralIntel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_round_trip() {
        let text = "Attacker used 8.8.8.8 to contact evil.example.com, \
                    dropping CVE-2024-12345 and hash 44d88612fea8a8f36de82e1278abb02f";
        let set = IocExtractor::new().extract(text);

        assert!(set.contains(IndicatorKind::Ipv4, "8.8.8.8"));
        assert!(set.contains(IndicatorKind::Domain, "evil.example.com"));
        assert!(set.contains(IndicatorKind::Cve, "CVE-2024-12345"));
        assert!(set.contains(
            IndicatorKind::Hash,
            "44d88612fea8a8f36de82e1278abb02f"
        ));
    }

    #[test]
    fn sha256_and_md5_share_hash_kind() {
        let text = "payloads: 44d88612fea8a8f36de82e1278abb02f and \
                    275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";
        let set = IocExtractor::new().extract(text);
        assert_eq!(set.values(IndicatorKind::Hash).unwrap().len(), 2);
    }

    #[test]
    fn html_markup_is_stripped_before_matching() {
        let text = r#"<a href="https://tracker.internal/10.0.0.1/x.exe">update</a> clean text"#;
        let set = IocExtractor::new().extract(text);
        // Values inside tag attributes must not match.
        assert!(set.values(IndicatorKind::Ipv4).is_none());
        assert!(set.values(IndicatorKind::Artifact).is_none());
    }

    #[test]
    fn registry_run_key_and_artifact() {
        let text = r"Persistence via HKLM\Software\Microsoft\Windows\CurrentVersion\Run dropping loader.dll";
        let set = IocExtractor::new().extract(text);
        assert_eq!(set.values(IndicatorKind::RegistryKey).unwrap().len(), 1);
        assert!(set.contains(IndicatorKind::Artifact, "loader.dll"));
    }

    #[test]
    fn campaign_url_promotes_to_domain() {
        let text = "staging at bad-cdn.example.net/gate/a1 observed";
        let set = IocExtractor::new().extract(text);
        let url = "bad-cdn.example.net/gate/a1";
        assert!(set.contains(IndicatorKind::CampaignUrl, url));
        assert!(set.contains(IndicatorKind::Domain, url));
        // The bare host also matches the domain rule on its own.
        assert!(set.contains(IndicatorKind::Domain, "bad-cdn.example.net"));
    }

    #[test]
    fn empty_kinds_are_omitted() {
        let set = IocExtractor::new().extract("nothing of interest here");
        assert!(set.values(IndicatorKind::Ipv4).is_none());
        assert!(set.values(IndicatorKind::Cve).is_none());
    }

    #[test]
    fn values_are_deduplicated() {
        let set = IocExtractor::new().extract("8.8.8.8 seen again at 8.8.8.8");
        assert_eq!(set.values(IndicatorKind::Ipv4).unwrap().len(), 1);
    }

    #[test]
    fn categorize_prefers_cve() {
        let set = IocExtractor::new().extract("CVE-2024-0001 served from 1.2.3.4");
        assert_eq!(categorize(&set), PrimaryVector::VulnerabilityExploitation);
    }
}
