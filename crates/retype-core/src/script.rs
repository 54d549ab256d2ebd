//! Two-phase edit scripts: clear every touched line, then retype insertions

use crate::patch::{Change, ChangedFile};
use std::collections::HashSet;

/// Text to type at a position, one task per distinct target line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTask {
    pub line: usize,
    pub column: usize,
    pub text: String,
}

/// A single step of an edit script in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep<'a> {
    Clear(usize),
    Type(&'a InsertTask),
}

/// Edit script derived from one changed file.
///
/// All deletions run before any insertion, so insertion coordinates stay valid
/// while earlier lines are being cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    /// Lines to clear, deduplicated, in first-touched order
    pub deletions: Vec<usize>,
    pub insertions: Vec<InsertTask>,
}

impl EditScript {
    pub fn build(file: &ChangedFile) -> Self {
        let mut touched = HashSet::new();
        let mut deletions = Vec::new();
        for change in &file.changes {
            if touched.insert(change.line()) {
                deletions.push(change.line());
            }
        }

        // Only the first insert per line is honored. Later inserts on the same
        // line are dropped, which collapses same-line inserts into one.
        let mut processed = HashSet::new();
        let insertions = file
            .changes
            .iter()
            .filter_map(|change| match change {
                Change::Insert { line, column, text } if processed.insert(*line) => {
                    Some(InsertTask {
                        line: *line,
                        column: *column,
                        text: text.clone(),
                    })
                }
                _ => None,
            })
            .collect();

        Self {
            deletions,
            insertions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty()
    }

    /// Whether a cleared line gets new content typed back into it
    pub fn retypes(&self, line: usize) -> bool {
        self.insertions.iter().any(|task| task.line == line)
    }

    /// Steps in execution order: every clear, then every insertion
    pub fn steps(&self) -> impl Iterator<Item = EditStep<'_>> {
        self.deletions
            .iter()
            .copied()
            .map(EditStep::Clear)
            .chain(self.insertions.iter().map(EditStep::Type))
    }

    /// Total characters to type
    pub fn typed_chars(&self) -> usize {
        self.insertions.iter().map(|t| t.text.chars().count()).sum()
    }
}
