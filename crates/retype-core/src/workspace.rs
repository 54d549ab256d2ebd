//! Temporary on-disk trees of a commit's files

use crate::control::PlaybackControl;
use crate::git::{GitError, HistorySource};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create temporary workspace {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to list files of {commit}: {source}")]
    List { commit: String, source: GitError },
}

/// Prefix of every materialized tree directory
pub const TREE_PREFIX: &str = "retype-";

/// Files fetched from history per batch
const READ_BATCH: usize = 64;

/// Bytes inspected when sniffing for binary content
const BINARY_SNIFF_LEN: usize = 8000;

/// Whether content looks binary: a NUL, or a control byte below 7 other than 4
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .take(BINARY_SNIFF_LEN)
        .any(|&byte| byte == 0 || (byte < 7 && byte != 4))
}

/// Materialized commit trees owned by a session, removed on cleanup
#[derive(Debug)]
pub struct TempTrees {
    root: PathBuf,
    dirs: BTreeSet<PathBuf>,
}

impl Default for TempTrees {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl TempTrees {
    /// Trees are created as `<root>/retype-<commit>`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: BTreeSet::new(),
        }
    }

    pub fn tree_path(&self, commit: &str) -> PathBuf {
        self.root.join(format!("{TREE_PREFIX}{commit}"))
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Write every file of `commit` into a fresh tree and track it.
    ///
    /// Files are fetched in batches and the runtime gets control back between
    /// batches. Returns `None` when stop or skip is requested midway; the
    /// partial tree stays tracked for cleanup.
    ///
    /// Files that cannot be read or written are skipped with a warning. If the
    /// tree itself cannot be created or listed, the partial tree is removed.
    pub async fn materialize<H: HistorySource>(
        &mut self,
        history: &H,
        commit: &str,
        control: &PlaybackControl,
    ) -> Result<Option<PathBuf>, WorkspaceError> {
        let dir = self.tree_path(commit);
        remove_tree(&dir);

        if let Err(source) = std::fs::create_dir_all(&dir) {
            remove_tree(&dir);
            return Err(WorkspaceError::Create { path: dir, source });
        }
        self.dirs.insert(dir.clone());

        let files = match history.files_at_revision(commit) {
            Ok(files) => files,
            Err(source) => {
                remove_tree(&dir);
                self.dirs.remove(&dir);
                return Err(WorkspaceError::List {
                    commit: commit.to_string(),
                    source,
                });
            }
        };

        let mut written = 0usize;
        for batch in files.chunks(READ_BATCH) {
            if control.stop_requested() || control.skip_requested() {
                debug!(commit, written, "materialization interrupted");
                return Ok(None);
            }

            let contents = history.read_files(commit, batch);
            for (file, content) in batch.iter().zip(contents) {
                let target = dir.join(file);
                let result = content
                    .map_err(|e| e.to_string())
                    .and_then(|content| write_file(&target, &content).map_err(|e| e.to_string()));
                match result {
                    Ok(()) => written += 1,
                    Err(err) => warn!(file = %file, error = %err, "could not materialize file"),
                }
            }
            tokio::task::yield_now().await;
        }

        debug!(commit, written, total = files.len(), dir = %dir.display(), "materialized tree");
        Ok(Some(dir))
    }

    /// Remove every tracked tree. Returns how many were tracked.
    pub fn cleanup(&mut self) -> usize {
        let count = self.dirs.len();
        for dir in std::mem::take(&mut self.dirs) {
            remove_tree(&dir);
        }
        if count > 0 {
            info!(count, "cleaned up temporary trees");
        }
        count
    }
}

fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

fn remove_tree(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(dir = %dir.display(), error = %err, "failed to remove temporary tree"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Commit;

    struct Tree {
        files: Vec<(&'static str, &'static str)>,
        broken: Option<&'static str>,
    }

    impl HistorySource for Tree {
        fn log(&self) -> Result<Vec<Commit>, GitError> {
            Ok(Vec::new())
        }

        fn file_at_revision(&self, commit: &str, path: &str) -> Result<Vec<u8>, GitError> {
            if Some(path) == self.broken {
                return Err(GitError::NotFound {
                    commit: commit.into(),
                    path: path.into(),
                });
            }
            self.files
                .iter()
                .find(|(name, _)| *name == path)
                .map(|(_, content)| content.as_bytes().to_vec())
                .ok_or(GitError::NotARepo)
        }

        fn files_at_revision(&self, _commit: &str) -> Result<Vec<String>, GitError> {
            Ok(self.files.iter().map(|(name, _)| name.to_string()).collect())
        }

        fn diff_for_commit(&self, _commit: &str) -> Result<String, GitError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_is_binary() {
        assert!(!is_binary(b"fn main() {}\n\ttabbed\r\n"));
        assert!(is_binary(b"PNG\0data"));
        assert!(is_binary(&[0x01, b'a']));
        assert!(!is_binary(&[0x04, b'a']));

        let mut late = vec![b'a'; BINARY_SNIFF_LEN];
        late.push(0);
        assert!(!is_binary(&late));
    }

    #[tokio::test]
    async fn test_materialize_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let history = Tree {
            files: vec![("README.md", "hi"), ("src/lib.rs", "pub fn x() {}")],
            broken: None,
        };
        let mut trees = TempTrees::new(root.path());

        let dir = trees
            .materialize(&history, "abc123", &PlaybackControl::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dir, root.path().join("retype-abc123"));
        assert_eq!(std::fs::read_to_string(dir.join("src/lib.rs")).unwrap(), "pub fn x() {}");
        assert_eq!(trees.tracked().count(), 1);

        assert_eq!(trees.cleanup(), 1);
        assert!(!dir.exists());
        assert!(trees.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let history = Tree {
            files: vec![("ok.txt", "ok"), ("bad.txt", "bad")],
            broken: Some("bad.txt"),
        };
        let mut trees = TempTrees::new(root.path());

        let dir = trees
            .materialize(&history, "def456", &PlaybackControl::new())
            .await
            .unwrap()
            .unwrap();
        assert!(dir.join("ok.txt").exists());
        assert!(!dir.join("bad.txt").exists());
    }

    #[tokio::test]
    async fn test_stale_tree_is_replaced() {
        let root = tempfile::tempdir().unwrap();
        let mut trees = TempTrees::new(root.path());
        let stale = trees.tree_path("c0ffee");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover"), "old").unwrap();

        let history = Tree {
            files: vec![("fresh", "new")],
            broken: None,
        };
        let dir = trees
            .materialize(&history, "c0ffee", &PlaybackControl::new())
            .await
            .unwrap()
            .unwrap();

        assert!(!dir.join("leftover").exists());
        assert!(dir.join("fresh").exists());
    }

    #[tokio::test]
    async fn test_stop_interrupts_large_tree() {
        let root = tempfile::tempdir().unwrap();
        let history = Tree {
            files: (0..READ_BATCH * 3)
                .map(|i| (&*format!("f{i}.txt").leak(), "x"))
                .collect(),
            broken: None,
        };
        let control = PlaybackControl::new();
        control.begin_session();
        control.request_stop();
        let mut trees = TempTrees::new(root.path());

        let dir = trees.materialize(&history, "big", &control).await.unwrap();

        assert!(dir.is_none());
        assert_eq!(trees.tracked().count(), 1);
        assert!(!trees.tree_path("big").join("f0.txt").exists());
        assert_eq!(trees.cleanup(), 1);
        assert!(!trees.tree_path("big").exists());
    }
}
