//! Bounded, persisted set of previously processed item identifiers.
//!
//! The state file is a JSON array of strings. A missing file is a cold
//! start; a corrupt file is reset to empty (reprocessing is preferred over
//! a crashed run). Commits are atomic: write a temp file in the same
//! directory, then rename over the target.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use vigil_core::IntelItem;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to persist state to {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Ordered set of processed ids, most recently added last.
#[derive(Debug, Clone)]
pub struct ProcessedState {
    ids: Vec<String>,
    max_size: usize,
}

impl ProcessedState {
    pub fn empty(max_size: usize) -> Self {
        Self {
            ids: Vec::new(),
            max_size,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Merge newly processed ids, pruning oldest-first to `max_size`.
    ///
    /// Only call with ids from a run that completed through publish.
    pub fn merge(&mut self, new_ids: impl IntoIterator<Item = String>) {
        for id in new_ids {
            if !self.contains(&id) {
                self.ids.push(id);
            }
        }
        if self.ids.len() > self.max_size {
            let excess = self.ids.len() - self.max_size;
            self.ids.drain(..excess);
        }
    }
}

/// Loads, filters against, and commits the persisted dedup state.
///
/// Single-writer-per-run: no file locking, concurrent runs against the
/// same state file are not supported.
pub struct StateStore {
    path: PathBuf,
    max_size: usize,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            path: path.into(),
            max_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state. Missing file is a cold start; a corrupt
    /// file logs a warning and resets to empty.
    pub fn load(&self) -> ProcessedState {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ProcessedState::empty(self.max_size);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable state file, resetting to empty");
                return ProcessedState::empty(self.max_size);
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(mut ids) => {
                if ids.len() > self.max_size {
                    let excess = ids.len() - self.max_size;
                    ids.drain(..excess);
                }
                ProcessedState {
                    ids,
                    max_size: self.max_size,
                }
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt state file, resetting to empty");
                ProcessedState::empty(self.max_size)
            }
        }
    }

    /// Drop items whose id is already a member of the state.
    pub fn filter_new<'a>(
        &self,
        state: &ProcessedState,
        items: &'a [IntelItem],
    ) -> Vec<&'a IntelItem> {
        items.iter().filter(|i| !state.contains(&i.id)).collect()
    }

    /// Merge `new_ids` into the state and persist atomically.
    pub fn commit(
        &self,
        state: &mut ProcessedState,
        new_ids: impl IntoIterator<Item = String>,
    ) -> Result<()> {
        state.merge(new_ids);
        self.persist(state)
    }

    fn persist(&self, state: &ProcessedState) -> Result<()> {
        let json = serde_json::to_string_pretty(&state.ids)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StateError::Persist {
                    path: self.path.display().to_string(),
                    source: e,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| StateError::Persist {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(id: &str) -> IntelItem {
        IntelItem {
            id: id.to_string(),
            title: format!("advisory {id}"),
            link: format!("https://example.com/{id}"),
            summary: String::new(),
            source: "test".to_string(),
            published_at: None,
        }
    }

    #[test]
    fn missing_file_is_cold_start() {
        let tmp = TempDir::new().expect("tempdir");
        let store = StateStore::new(tmp.path().join("state.json"), 10);
        let state = store.load();
        assert!(state.is_empty());
    }

    #[test]
    fn corrupt_file_resets_to_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("state.json");
        fs::write(&path, "{not valid json").unwrap();
        let store = StateStore::new(&path, 10);
        assert!(store.load().is_empty());
    }

    #[test]
    fn commit_roundtrip() {
        let tmp = TempDir::new().expect("tempdir");
        let store = StateStore::new(tmp.path().join("state.json"), 10);
        let mut state = store.load();
        store
            .commit(&mut state, vec!["a".into(), "b".into()])
            .expect("commit");

        let reloaded = store.load();
        assert!(reloaded.contains("a"));
        assert!(reloaded.contains("b"));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn filter_drops_seen_items() {
        let tmp = TempDir::new().expect("tempdir");
        let store = StateStore::new(tmp.path().join("state.json"), 10);
        let mut state = store.load();
        store.commit(&mut state, vec!["a".into()]).expect("commit");

        let items = vec![item("a"), item("b")];
        let fresh = store.filter_new(&state, &items);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "b");
    }

    #[test]
    fn state_never_exceeds_max_size() {
        let tmp = TempDir::new().expect("tempdir");
        let store = StateStore::new(tmp.path().join("state.json"), 5);
        let mut state = store.load();
        for batch in 0..4 {
            let ids: Vec<String> = (0..3).map(|i| format!("id-{batch}-{i}")).collect();
            store.commit(&mut state, ids).expect("commit");
            assert!(state.len() <= 5);
        }
        // Eviction is oldest-first: the latest batch always survives.
        assert!(state.contains("id-3-2"));
        assert!(!state.contains("id-0-0"));
        assert_eq!(store.load().len(), 5);
    }

    #[test]
    fn merge_is_idempotent_for_known_ids() {
        let mut state = ProcessedState::empty(10);
        state.merge(vec!["a".to_string(), "b".to_string()]);
        let before = state.ids().to_vec();
        state.merge(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(state.ids(), before.as_slice());
    }
}
