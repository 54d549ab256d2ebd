//! Per-workspace "continue to the next commit" preference

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid preferences file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Saved answer to the between-commits prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextCommitPreference {
    Always,
    Never,
}

/// Workspace-keyed preferences, optionally persisted as JSON
#[derive(Debug, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, NextCommitPreference>,
}

impl PreferenceStore {
    /// Preferences that are never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, workspace: &str) -> Option<NextCommitPreference> {
        self.entries.get(workspace).copied()
    }

    pub fn set(
        &mut self,
        workspace: &str,
        preference: NextCommitPreference,
    ) -> Result<(), PrefsError> {
        self.entries.insert(workspace.to_string(), preference);
        self.save()
    }

    /// Forget the preference. Returns whether one was saved.
    pub fn clear(&mut self, workspace: &str) -> Result<bool, PrefsError> {
        let removed = self.entries.remove(workspace).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    fn save(&self) -> Result<(), PrefsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(store.get("/repo"), None);
    }

    #[test]
    fn test_persisted_between_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retype").join("preferences.json");

        let mut store = PreferenceStore::load(&path).unwrap();
        store.set("/repo/a", NextCommitPreference::Always).unwrap();
        store.set("/repo/b", NextCommitPreference::Never).unwrap();

        let reloaded = PreferenceStore::load(&path).unwrap();
        assert_eq!(reloaded.get("/repo/a"), Some(NextCommitPreference::Always));
        assert_eq!(reloaded.get("/repo/b"), Some(NextCommitPreference::Never));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"always\""));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let mut store = PreferenceStore::load(&path).unwrap();
        store.set("/w", NextCommitPreference::Never).unwrap();

        assert!(store.clear("/w").unwrap());
        assert!(!store.clear("/w").unwrap());
        assert_eq!(PreferenceStore::load(&path).unwrap().get("/w"), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PreferenceStore::load(&path), Err(PrefsError::Json(_))));
    }

    #[test]
    fn test_in_memory_never_writes() {
        let mut store = PreferenceStore::in_memory();
        store.set("/w", NextCommitPreference::Always).unwrap();
        assert_eq!(store.get("/w"), Some(NextCommitPreference::Always));
        assert!(store.path().is_none());
    }
}
