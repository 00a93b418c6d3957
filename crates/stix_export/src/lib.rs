//! Export Engine: STIX 2.1 bundle serialization and the rolling manifest
//! that downstream dashboards read.
//!
//! A bundle is written once, uniquely named, and never overwritten. The
//! manifest is rewritten in full each cycle and bounded to the most recent
//! K bundles; a malformed historical bundle is skipped with a warning.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;
use vigil_core::{IndicatorKind, IndicatorSet, RiskAssessment, TechniqueMatch};

pub mod misp;

pub const SPEC_VERSION: &str = "2.1";
pub const IDENTITY_NAME: &str = "Vigil Sentinel";
pub const TLP_LABEL: &str = "CLEAR";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("bundle already exists at {0}, refusing to overwrite")]
    AlreadyExists(String),
    #[error("export io error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub spec_version: String,
    pub id: String,
    pub name: String,
    pub identity_class: String,
    pub created: String,
    pub modified: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub spec_version: String,
    pub id: String,
    pub name: String,
    pub indicator_types: Vec<String>,
    pub pattern: String,
    pub pattern_type: String,
    pub created: String,
    pub modified: String,
    pub valid_from: String,
    pub confidence: u8,
    pub created_by_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub spec_version: String,
    pub id: String,
    pub name: String,
    pub description: String,
    pub published: String,
    pub created: String,
    pub modified: String,
    pub object_refs: Vec<String>,
    pub created_by_ref: String,
    pub x_risk_score: f64,
    pub x_tlp: String,
    pub x_tactics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleObject {
    Identity(IdentityObject),
    Indicator(IndicatorObject),
    Report(ReportObject),
}

impl BundleObject {
    pub fn id(&self) -> &str {
        match self {
            BundleObject::Identity(o) => &o.id,
            BundleObject::Indicator(o) => &o.id,
            BundleObject::Report(o) => &o.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "type")]
    pub bundle_type: String,
    pub id: String,
    pub objects: Vec<BundleObject>,
}

impl Bundle {
    pub fn report(&self) -> Option<&ReportObject> {
        self.objects.iter().find_map(|o| match o {
            BundleObject::Report(r) => Some(r),
            _ => None,
        })
    }
}

/// STIX pattern string for one indicator value, keyed by kind.
fn stix_pattern(kind: IndicatorKind, value: &str) -> String {
    match kind {
        IndicatorKind::Ipv4 => format!("[ipv4-addr:value = '{value}']"),
        IndicatorKind::Domain => format!("[domain-name:value = '{value}']"),
        IndicatorKind::Hash => {
            // Length class picks the algorithm: 32 hex is MD5, 64 is SHA-256.
            let algo = if value.len() == 32 { "MD5" } else { "SHA-256" };
            format!("[file:hashes.'{algo}' = '{value}']")
        }
        IndicatorKind::Cve => format!("[vulnerability:name = '{value}']"),
        IndicatorKind::RegistryKey => {
            format!("[windows-registry-key:key = '{}']", value.replace('\\', "\\\\"))
        }
        IndicatorKind::Artifact => format!("[file:name = '{value}']"),
        IndicatorKind::CampaignUrl => format!("[url:value = '{value}']"),
    }
}

/// Build one bundle for a run's findings: one identity, one indicator per
/// unique value, one report referencing every object created here.
pub fn build_bundle(
    report_title: &str,
    indicators: &IndicatorSet,
    risk: &RiskAssessment,
    techniques: &[TechniqueMatch],
) -> Bundle {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let identity_id = format!("identity--{}", Uuid::new_v4());
    let confidence = (risk.score * 10.0).round().clamp(0.0, 100.0) as u8;

    let mut objects = vec![BundleObject::Identity(IdentityObject {
        object_type: "identity".to_string(),
        spec_version: SPEC_VERSION.to_string(),
        id: identity_id.clone(),
        name: IDENTITY_NAME.to_string(),
        identity_class: "organization".to_string(),
        created: now.clone(),
        modified: now.clone(),
    })];

    for (kind, value) in indicators.iter() {
        objects.push(BundleObject::Indicator(IndicatorObject {
            object_type: "indicator".to_string(),
            spec_version: SPEC_VERSION.to_string(),
            id: format!("indicator--{}", Uuid::new_v4()),
            name: format!("Extracted {} from {}", kind.as_str(), report_title),
            indicator_types: vec!["malicious-activity".to_string()],
            pattern: stix_pattern(kind, value),
            pattern_type: "stix".to_string(),
            created: now.clone(),
            modified: now.clone(),
            valid_from: now.clone(),
            confidence,
            created_by_ref: identity_id.clone(),
        }));
    }

    let object_refs: Vec<String> = objects.iter().map(|o| o.id().to_string()).collect();
    let tactics: Vec<String> = {
        let mut t: Vec<String> = techniques.iter().map(|m| m.tactic.clone()).collect();
        t.dedup();
        t
    };

    objects.push(BundleObject::Report(ReportObject {
        object_type: "report".to_string(),
        spec_version: SPEC_VERSION.to_string(),
        id: format!("report--{}", Uuid::new_v4()),
        name: report_title.to_string(),
        description: format!(
            "Automated threat triage report with risk score {:.1}",
            risk.score
        ),
        published: now.clone(),
        created: now.clone(),
        modified: now,
        object_refs,
        created_by_ref: identity_id,
        x_risk_score: risk.score,
        x_tlp: TLP_LABEL.to_string(),
        x_tactics: tactics,
    }));

    Bundle {
        bundle_type: "bundle".to_string(),
        id: format!("bundle--{}", Uuid::new_v4()),
        objects,
    }
}

pub struct ExportStore {
    export_dir: PathBuf,
    manifest_max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub risk_score: f64,
    pub tlp: String,
    pub tactics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub last_updated: String,
    pub total_nodes: usize,
    pub files: Vec<ManifestEntry>,
}

impl ExportStore {
    pub fn new(export_dir: impl Into<PathBuf>, manifest_max_entries: usize) -> Self {
        Self {
            export_dir: export_dir.into(),
            manifest_max_entries,
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Write the bundle as an immutable, uniquely named artifact.
    pub fn persist(&self, bundle: &Bundle) -> Result<PathBuf> {
        fs::create_dir_all(&self.export_dir).map_err(|e| ExportError::Io {
            path: self.export_dir.display().to_string(),
            source: e,
        })?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let short = &bundle.id[bundle.id.len().saturating_sub(8)..];
        let path = self
            .export_dir
            .join(format!("vigil_iocs_{stamp}_{short}.stix.json"));
        if path.exists() {
            return Err(ExportError::AlreadyExists(path.display().to_string()));
        }

        let json = serde_json::to_string_pretty(bundle)?;
        let mut f = fs::File::create(&path).map_err(|e| ExportError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        f.write_all(json.as_bytes()).map_err(|e| ExportError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        f.sync_all().map_err(|e| ExportError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(path)
    }

    /// Rescan recent bundles and rewrite the manifest in full.
    ///
    /// Runs on no-op cycles too, so downstream consumers always see a
    /// consistent index. Returns the rebuilt manifest.
    pub fn update_manifest(&self) -> Result<Manifest> {
        fs::create_dir_all(&self.export_dir).map_err(|e| ExportError::Io {
            path: self.export_dir.display().to_string(),
            source: e,
        })?;

        let mut bundle_paths: Vec<PathBuf> = fs::read_dir(&self.export_dir)
            .map_err(|e| ExportError::Io {
                path: self.export_dir.display().to_string(),
                source: e,
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".stix.json"))
            })
            .collect();

        // Timestamped names sort chronologically; newest first.
        bundle_paths.sort();
        bundle_paths.reverse();

        let mut files = Vec::new();
        let mut total_nodes = 0;
        for path in bundle_paths.iter().take(self.manifest_max_entries) {
            match self.summarize(path) {
                Some((entry, objects)) => {
                    total_nodes += objects;
                    files.push(entry);
                }
                None => {
                    warn!(path = %path.display(), "skipping malformed bundle during manifest rebuild");
                }
            }
        }

        let manifest = Manifest {
            last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_nodes,
            files,
        };

        let json = serde_json::to_string_pretty(&manifest)?;
        let path = self.manifest_path();
        let tmp = path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| ExportError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(manifest)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.export_dir.join("manifest.json")
    }

    fn summarize(&self, path: &Path) -> Option<(ManifestEntry, usize)> {
        let content = fs::read_to_string(path).ok()?;
        let bundle: Bundle = serde_json::from_str(&content).ok()?;
        let report = bundle.report()?;
        let name = path.file_name()?.to_str()?.to_string();
        Some((
            ManifestEntry {
                name,
                risk_score: report.x_risk_score,
                tlp: report.x_tlp.clone(),
                tactics: report.x_tactics.clone(),
            },
            bundle.objects.len(),
        ))
    }
}
