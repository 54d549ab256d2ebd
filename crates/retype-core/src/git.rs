//! Git history source for playback

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository")]
    NotARepo,
    #[error("Git command failed: {0}")]
    CommandFailed(String),
    #[error("{path} does not exist at {commit}")]
    NotFound { commit: String, path: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A commit read from history. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: String,
    /// Full message: first line is the summary, the rest is the body
    pub message: String,
    pub author: String,
    /// Author time as a unix timestamp
    pub author_time: Option<i64>,
}

impl Commit {
    pub fn short_id(&self) -> &str {
        self.id.get(..7).unwrap_or(&self.id)
    }

    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn body(&self) -> &str {
        match self.message.split_once('\n') {
            Some((_, body)) => body.trim(),
            None => "",
        }
    }
}

/// Where commits, diffs and file contents come from.
///
/// `log` is ordered newest first. Diffs are rendered with zero context lines.
pub trait HistorySource {
    fn log(&self) -> Result<Vec<Commit>, GitError>;
    fn file_at_revision(&self, commit: &str, path: &str) -> Result<Vec<u8>, GitError>;
    fn files_at_revision(&self, commit: &str) -> Result<Vec<String>, GitError>;
    fn diff_for_commit(&self, commit: &str) -> Result<String, GitError>;

    /// Contents of several files at `commit`, one result per path, in order
    fn read_files(&self, commit: &str, paths: &[String]) -> Vec<Result<Vec<u8>, GitError>> {
        paths
            .iter()
            .map(|path| self.file_at_revision(commit, path))
            .collect()
    }
}

impl<T: HistorySource + ?Sized> HistorySource for &T {
    fn log(&self) -> Result<Vec<Commit>, GitError> {
        (**self).log()
    }

    fn file_at_revision(&self, commit: &str, path: &str) -> Result<Vec<u8>, GitError> {
        (**self).file_at_revision(commit, path)
    }

    fn files_at_revision(&self, commit: &str) -> Result<Vec<String>, GitError> {
        (**self).files_at_revision(commit)
    }

    fn diff_for_commit(&self, commit: &str) -> Result<String, GitError> {
        (**self).diff_for_commit(commit)
    }

    fn read_files(&self, commit: &str, paths: &[String]) -> Vec<Result<Vec<u8>, GitError>> {
        (**self).read_files(commit, paths)
    }
}

/// Check if a directory is a git repository
pub fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(path)
        .arg("rev-parse")
        .arg("--git-dir")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get the root of the git repository
pub fn get_repo_root(path: &Path) -> Result<PathBuf, GitError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(path)
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()?;

    if !output.status.success() {
        return Err(GitError::NotARepo);
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(root))
}

/// History source backed by the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    /// Open the repository containing `path`
    pub fn open(path: &Path) -> Result<Self, GitError> {
        if !is_git_repo(path) {
            return Err(GitError::NotARepo);
        }
        Ok(Self {
            repo_root: get_repo_root(path)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.repo_root
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(args)
            .output()?;

        if !output.status.success() {
            return Err(GitError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(output.stdout)
    }

    /// One `git cat-file --batch` for every path
    fn cat_file_batch(
        &self,
        commit: &str,
        paths: &[String],
    ) -> Result<Vec<Result<Vec<u8>, GitError>>, GitError> {
        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(["cat-file", "--batch"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut input = String::new();
        for path in paths {
            input.push_str(commit);
            input.push(':');
            input.push_str(path);
            input.push('\n');
        }
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| GitError::CommandFailed("cat-file stdin unavailable".into()))?;
        // Written from another thread so a full stdout pipe cannot block the request
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        writer
            .join()
            .map_err(|_| GitError::CommandFailed("cat-file writer panicked".into()))??;

        if !output.status.success() {
            return Err(GitError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_batch(&output.stdout, commit, paths))
    }
}

/// `git show` arguments for a zero-context patch, independent of the user's
/// color, prefix and external diff settings
fn diff_args(commit: &str) -> [&str; 9] {
    [
        "show",
        commit,
        "--format=",
        "--patch",
        "-U0",
        "--no-color",
        "--no-ext-diff",
        "--src-prefix=a/",
        "--dst-prefix=b/",
    ]
}

const LOG_FORMAT: &str = "--pretty=format:%H%x1f%an%x1f%at%x1f%B%x1e";

impl HistorySource for GitCli {
    fn log(&self) -> Result<Vec<Commit>, GitError> {
        let output = self.run(&["log", LOG_FORMAT])?;
        Ok(parse_log(&String::from_utf8_lossy(&output)))
    }

    fn file_at_revision(&self, commit: &str, path: &str) -> Result<Vec<u8>, GitError> {
        let spec = format!("{}:{}", commit, path);
        self.run(&["show", &spec]).map_err(|err| match err {
            GitError::CommandFailed(_) => GitError::NotFound {
                commit: commit.to_string(),
                path: path.to_string(),
            },
            other => other,
        })
    }

    fn files_at_revision(&self, commit: &str) -> Result<Vec<String>, GitError> {
        let output = self.run(&["ls-tree", "-r", "--name-only", commit])?;
        Ok(String::from_utf8_lossy(&output)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn diff_for_commit(&self, commit: &str) -> Result<String, GitError> {
        let output = self.run(&diff_args(commit))?;
        Ok(String::from_utf8_lossy(&output).to_string())
    }

    fn read_files(&self, commit: &str, paths: &[String]) -> Vec<Result<Vec<u8>, GitError>> {
        match self.cat_file_batch(commit, paths) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(error = %err, "batched read failed, reading files one at a time");
                paths
                    .iter()
                    .map(|path| self.file_at_revision(commit, path))
                    .collect()
            }
        }
    }
}

/// Split `git cat-file --batch` output into one result per requested path.
///
/// Each object is `<oid> <type> <size>\n<content>\n`; an unknown one is a
/// single `<name> missing` line.
fn parse_batch(mut out: &[u8], commit: &str, paths: &[String]) -> Vec<Result<Vec<u8>, GitError>> {
    paths
        .iter()
        .map(|path| {
            let not_found = || GitError::NotFound {
                commit: commit.to_string(),
                path: path.clone(),
            };
            let end = out.iter().position(|&b| b == b'\n').ok_or_else(not_found)?;
            let header = String::from_utf8_lossy(&out[..end]).to_string();
            out = &out[end + 1..];

            let mut fields = header.rsplitn(3, ' ');
            let size = fields.next().and_then(|size| size.parse::<usize>().ok());
            let kind = fields.next();
            let Some(size) = size.filter(|&size| size <= out.len()) else {
                return Err(not_found());
            };
            let content = out[..size].to_vec();
            out = &out[(size + 1).min(out.len())..];

            match kind {
                Some("blob") => Ok(content),
                _ => Err(not_found()),
            }
        })
        .collect()
}

/// Parse `git log` output written with [`LOG_FORMAT`]
fn parse_log(output: &str) -> Vec<Commit> {
    let mut commits = Vec::new();

    for record in output.split('\u{1e}') {
        let record = record.trim_start_matches(['\n', '\r']);
        if record.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = record.splitn(4, '\u{1f}').collect();
        if parts.len() < 4 {
            continue;
        }

        commits.push(Commit {
            id: parts[0].trim().to_string(),
            author: parts[1].to_string(),
            author_time: parts[2].trim().parse::<i64>().ok(),
            message: parts[3].trim_end().to_string(),
        });
    }

    commits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log() {
        let output = "aaaaaaaaaa\u{1f}Ada\u{1f}1700000000\u{1f}Add parser\n\nHandles hunks.\n\u{1e}\n\
                      bbbbbbbbbb\u{1f}Bob\u{1f}1690000000\u{1f}Initial commit\n\u{1e}";
        let commits = parse_log(output);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "aaaaaaaaaa");
        assert_eq!(commits[0].short_id(), "aaaaaaa");
        assert_eq!(commits[0].author, "Ada");
        assert_eq!(commits[0].author_time, Some(1_700_000_000));
        assert_eq!(commits[0].summary(), "Add parser");
        assert_eq!(commits[0].body(), "Handles hunks.");
        assert_eq!(commits[1].summary(), "Initial commit");
        assert_eq!(commits[1].body(), "");
    }

    #[test]
    fn test_parse_log_skips_truncated_records() {
        let output = "cccccccc\u{1f}Cy\u{1e}dddddddd\u{1f}Di\u{1f}bad\u{1f}Fix\u{1e}";
        let commits = parse_log(output);

        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].id, "dddddddd");
        assert_eq!(commits[0].author_time, None);
    }

    #[test]
    fn test_parse_batch() {
        let out = b"1111 blob 5\nhello\nabc:gone.txt missing\n2222 blob 0\n\n3333 blob 3\na\nb\n";
        let paths: Vec<String> = ["a.txt", "gone.txt", "empty", "two lines"]
            .iter()
            .map(|p| p.to_string())
            .collect();
        let results = parse_batch(out, "abc", &paths);

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap(), b"hello");
        assert!(matches!(&results[1], Err(GitError::NotFound { path, .. }) if path == "gone.txt"));
        assert_eq!(results[2].as_ref().unwrap(), b"");
        assert_eq!(results[3].as_ref().unwrap(), b"a\nb");
    }

    #[test]
    fn test_parse_batch_truncated_output() {
        let paths = vec!["a".to_string(), "b".to_string()];
        let results = parse_batch(b"1111 blob 50\nshort", "abc", &paths);
        assert!(results.iter().all(Result::is_err));
    }

    #[test]
    fn test_diff_args_pin_the_patch_format() {
        let args = diff_args("abc");
        assert_eq!(&args[..5], &["show", "abc", "--format=", "--patch", "-U0"]);
        for flag in ["--no-color", "--no-ext-diff", "--src-prefix=a/", "--dst-prefix=b/"] {
            assert!(args.contains(&flag), "missing {flag}");
        }
    }

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_diff_ignores_user_diff_settings() {
        let dir = tempfile::tempdir().unwrap();
        if !git(dir.path(), &["init", "-q"]) {
            // git is not installed
            return;
        }
        for (key, value) in [("diff.noprefix", "true"), ("color.ui", "always")] {
            assert!(git(dir.path(), &["config", key, value]));
        }
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        assert!(git(dir.path(), &["add", "a.txt"]));
        assert!(git(dir.path(), &["commit", "-q", "-m", "first"]));
        std::fs::write(dir.path().join("a.txt"), "two\n").unwrap();
        assert!(git(dir.path(), &["commit", "-q", "-am", "second"]));

        let repo = GitCli::open(dir.path()).unwrap();
        let head = &repo.log().unwrap()[0];
        let files = crate::patch::parse_commit_diff(&repo.diff_for_commit(&head.id).unwrap());

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.txt");
        assert_eq!(files[0].changes.len(), 2);
    }

    #[test]
    fn test_short_id_of_short_hash() {
        let commit = Commit {
            id: "abc".into(),
            message: String::new(),
            author: String::new(),
            author_time: None,
        };
        assert_eq!(commit.short_id(), "abc");
        assert_eq!(commit.summary(), "");
    }
}
