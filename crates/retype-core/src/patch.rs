//! Zero-context unified diff parsing into per-file line changes
//!
//! Input is the output of `git show <rev> --format= --patch -U0`. Hunks carry
//! only pure additions and deletions; line numbers in the emitted changes are
//! 0-based and follow the hunk counters as they advance.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A primitive line-level edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The entire old line content removed (old-file coordinates)
    Delete { line: usize, text: String },
    /// Text inserted at a position in the new file
    Insert {
        line: usize,
        column: usize,
        text: String,
    },
}

impl Change {
    pub fn line(&self) -> usize {
        match self {
            Change::Delete { line, .. } | Change::Insert { line, .. } => *line,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Change::Delete { text, .. } | Change::Insert { text, .. } => text,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Change::Insert { .. })
    }
}

/// One file touched by a commit, with its changes in diff order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangedFile {
    /// Relative, forward-slash path on the new side
    pub path: String,
    pub changes: Vec<Change>,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            changes: Vec::new(),
        }
    }

    pub fn insertions(&self) -> usize {
        self.changes.iter().filter(|c| c.is_insert()).count()
    }

    pub fn deletions(&self) -> usize {
        self.changes.len() - self.insertions()
    }
}

/// Parsed `@@ -old[,n] +new[,m] @@` header (1-based starts)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

fn hunk_header_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").ok())
        .as_ref()
}

/// Parse a hunk header line. A missing count means 1.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let caps = hunk_header_regex()?.captures(line)?;
    let number = |idx: usize, default: usize| -> Option<usize> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    Some(HunkHeader {
        old_start: number(1, 0)?,
        old_count: number(2, 1)?,
        new_start: number(3, 0)?,
        new_count: number(4, 1)?,
    })
}

/// Running line counters for the hunk being read
#[derive(Debug)]
struct HunkCursor {
    old_line: usize,
    new_line: usize,
    old_remaining: usize,
    new_remaining: usize,
}

impl From<HunkHeader> for HunkCursor {
    fn from(header: HunkHeader) -> Self {
        Self {
            old_line: header.old_start,
            new_line: header.new_start,
            old_remaining: header.old_count,
            new_remaining: header.new_count,
        }
    }
}

impl HunkCursor {
    /// Still expecting body lines declared by the header
    fn in_body(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    fn delete(&mut self, text: &str) -> Change {
        let change = Change::Delete {
            line: self.old_line.saturating_sub(1),
            text: text.to_string(),
        };
        self.old_line += 1;
        self.old_remaining = self.old_remaining.saturating_sub(1);
        change
    }

    fn insert(&mut self, text: &str) -> Change {
        let change = Change::Insert {
            line: self.new_line.saturating_sub(1),
            column: 0,
            text: text.to_string(),
        };
        self.new_line += 1;
        self.new_remaining = self.new_remaining.saturating_sub(1);
        change
    }

    fn context(&mut self) {
        self.old_line += 1;
        self.new_line += 1;
        self.old_remaining = self.old_remaining.saturating_sub(1);
        self.new_remaining = self.new_remaining.saturating_sub(1);
    }
}

/// Extract the new-side path from a `diff --git a/<old> b/<new>` header
fn new_side_path(header: &str) -> Option<String> {
    let rest = header.strip_prefix("diff --git ")?;

    // Unchanged paths are symmetric: "a/<p> b/<p>"
    let path = rest
        .strip_prefix("a/")
        .and_then(|paths| {
            let half = paths.len().checked_sub(3)? / 2;
            let (old, new) = (paths.get(..half)?, paths.get(half..)?);
            new.strip_prefix(" b/").filter(|new| *new == old)
        })
        .or_else(|| rest.split_once(" b/").map(|(_, new)| new))?;

    normalize_path(path)
}

fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim().replace('\\', "/");
    let path = path.trim_start_matches("./");
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Parse one commit's zero-context diff into changed files, in diff order.
///
/// Never fails: a malformed file header skips that file, and lines seen before
/// any file header or hunk header are dropped.
pub fn parse_commit_diff(diff: &str) -> Vec<ChangedFile> {
    let mut files = Vec::new();
    let mut current: Option<ChangedFile> = None;
    let mut hunk: Option<HunkCursor> = None;

    for line in diff.split('\n') {
        if line.starts_with("diff --git ") {
            if let Some(file) = current.take() {
                files.push(file);
            }
            hunk = None;
            current = new_side_path(line).map(ChangedFile::new);
            if current.is_none() {
                warn!(header = line, "skipping file with unparseable diff header");
            }
            continue;
        }

        let in_body = hunk.as_ref().is_some_and(HunkCursor::in_body);
        if !in_body && (line.starts_with("+++") || line.starts_with("---")) {
            continue;
        }

        if line.starts_with("@@") {
            if current.is_none() {
                debug!(line, "dropping hunk outside of a file");
                continue;
            }
            hunk = parse_hunk_header(line).map(HunkCursor::from);
            if hunk.is_none() {
                warn!(line, "dropping malformed hunk header");
            }
            continue;
        }

        let (Some(file), Some(cursor)) = (current.as_mut(), hunk.as_mut()) else {
            continue;
        };
        if line.is_empty() || line.starts_with('\\') {
            continue;
        }

        if let Some(text) = line.strip_prefix('-') {
            file.changes.push(cursor.delete(text));
        } else if let Some(text) = line.strip_prefix('+') {
            file.changes.push(cursor.insert(text));
        } else {
            cursor.context();
        }
    }

    if let Some(file) = current.take() {
        files.push(file);
    }

    files
}
