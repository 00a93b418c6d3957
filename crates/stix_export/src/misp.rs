//! MISP-compatible flat event export, written alongside the STIX bundle.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::IndicatorSet;

use crate::{ExportError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MispAttribute {
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MispEvent {
    pub info: String,
    pub date: String,
    pub attributes: Vec<MispAttribute>,
}

pub fn build_event(info: &str, indicators: &IndicatorSet) -> MispEvent {
    MispEvent {
        info: info.to_string(),
        date: Utc::now().format("%Y-%m-%d").to_string(),
        attributes: indicators
            .iter()
            .map(|(kind, value)| MispAttribute {
                attr_type: kind.as_str().to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

/// Write the event as an immutable, uniquely named artifact, same contract
/// as the bundle persist.
pub fn persist_event(export_dir: &Path, event: &MispEvent) -> Result<PathBuf> {
    fs::create_dir_all(export_dir).map_err(|e| ExportError::Io {
        path: export_dir.display().to_string(),
        source: e,
    })?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let short = &Uuid::new_v4().to_string()[..8];
    let path = export_dir.join(format!("vigil_iocs_{stamp}_{short}.misp.json"));
    if path.exists() {
        return Err(ExportError::AlreadyExists(path.display().to_string()));
    }
    let json = serde_json::to_string_pretty(event)?;
    let mut f = fs::File::create(&path).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    f.write_all(json.as_bytes()).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vigil_core::IndicatorKind;

    #[test]
    fn back_to_back_persists_never_collide() {
        let tmp = TempDir::new().expect("tempdir");
        let mut set = IndicatorSet::new();
        set.insert(IndicatorKind::Ipv4, "1.2.3.4");

        // Two events in the same second must land in distinct files, with
        // the first left intact.
        let first = build_event("Run A", &set);
        let second = build_event("Run B", &set);
        let p1 = persist_event(tmp.path(), &first).expect("persist first");
        let p2 = persist_event(tmp.path(), &second).expect("persist second");
        assert_ne!(p1, p2);

        let reread: MispEvent =
            serde_json::from_str(&fs::read_to_string(&p1).expect("read first")).expect("json");
        assert_eq!(reread.info, "Run A");
    }

    #[test]
    fn event_carries_one_attribute_per_value() {
        let mut set = IndicatorSet::new();
        set.insert(IndicatorKind::Cve, "CVE-2024-12345");
        set.insert(IndicatorKind::Ipv4, "1.2.3.4");
        let event = build_event("Daily Threat Intelligence", &set);
        assert_eq!(event.attributes.len(), 2);
        assert!(event
            .attributes
            .iter()
            .any(|a| a.attr_type == "cve" && a.value == "CVE-2024-12345"));
    }
}
