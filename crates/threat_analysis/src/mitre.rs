//! Keyword-triggered ATT&CK technique mapping.
//!
//! Loose correlation by design: a trigger word in the corpus maps to one
//! technique. The table is iterated in order and matches are unique.

use vigil_core::TechniqueMatch;

const TRIGGER_TABLE: &[(&str, &str, &str, &str)] = &[
    ("phishing", "T1566", "Phishing", "initial-access"),
    ("credential", "T1556", "Modify Authentication Process", "credential-access"),
    ("c2", "T1071", "Application Layer Protocol", "command-and-control"),
    ("beacon", "T1071.004", "DNS", "command-and-control"),
    ("ransomware", "T1486", "Data Encrypted for Impact", "impact"),
    ("exploit", "T1203", "Exploitation for Client Execution", "execution"),
    ("obfuscat", "T1027", "Obfuscated Files or Information", "defense-evasion"),
    ("exfiltrat", "T1041", "Exfiltration Over C2 Channel", "exfiltration"),
    ("powershell", "T1059.001", "PowerShell", "execution"),
    ("scheduled task", "T1053", "Scheduled Task/Job", "persistence"),
];

/// Scan the corpus and return matched techniques in table order.
pub fn map_techniques(corpus: &str) -> Vec<TechniqueMatch> {
    let lower = corpus.to_lowercase();
    let mut matches = Vec::new();
    for (trigger, id, name, tactic) in TRIGGER_TABLE {
        if lower.contains(trigger) {
            matches.push(TechniqueMatch {
                technique_id: id.to_string(),
                name: name.to_string(),
                tactic: tactic.to_string(),
            });
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_trigger_words_to_techniques() {
        let matches = map_techniques("Ransomware crew deploys PowerShell loader");
        let ids: Vec<&str> = matches.iter().map(|m| m.technique_id.as_str()).collect();
        assert!(ids.contains(&"T1486"));
        assert!(ids.contains(&"T1059.001"));
    }

    #[test]
    fn no_triggers_no_matches() {
        assert!(map_techniques("routine patch notes").is_empty());
    }

    #[test]
    fn matches_follow_table_order() {
        let matches = map_techniques("exploit kit delivered via phishing");
        assert_eq!(matches[0].technique_id, "T1566");
        assert_eq!(matches[1].technique_id, "T1203");
    }
}
