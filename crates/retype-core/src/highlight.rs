//! Highlight regions per document
//!
//! The tracker is the single owner of every document's regions. Each mutation
//! re-renders the complete region set for that document instead of patching
//! individual decorations, so ranges never go stale when lines change.

use crate::document::{DocumentId, Position, Surface, TextRange};
use std::collections::HashMap;

/// Style category of a highlighted region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightKind {
    Addition,
    Deletion,
    Modification,
    /// Point-in-time cursor marker
    Cursor,
}

impl HighlightKind {
    pub const ALL: [HighlightKind; 4] = [
        HighlightKind::Addition,
        HighlightKind::Deletion,
        HighlightKind::Modification,
        HighlightKind::Cursor,
    ];
}

/// Regions for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightState {
    pub additions: Vec<TextRange>,
    pub deletions: Vec<TextRange>,
    pub modifications: Vec<TextRange>,
    pub cursor: Option<TextRange>,
}

impl HighlightState {
    pub fn ranges(&self, kind: HighlightKind) -> &[TextRange] {
        match kind {
            HighlightKind::Addition => &self.additions,
            HighlightKind::Deletion => &self.deletions,
            HighlightKind::Modification => &self.modifications,
            HighlightKind::Cursor => self.cursor.as_slice(),
        }
    }

    pub fn push(&mut self, kind: HighlightKind, range: TextRange) {
        match kind {
            HighlightKind::Addition => self.additions.push(range),
            HighlightKind::Deletion => self.deletions.push(range),
            HighlightKind::Modification => self.modifications.push(range),
            HighlightKind::Cursor => self.cursor = Some(range),
        }
    }

    pub fn region_count(&self) -> usize {
        self.additions.len()
            + self.deletions.len()
            + self.modifications.len()
            + usize::from(self.cursor.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.region_count() == 0
    }
}

/// Owns the highlight state of every document touched during playback
#[derive(Debug, Default)]
pub struct HighlightTracker {
    states: HashMap<DocumentId, HighlightState>,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, doc: &DocumentId) -> Option<&HighlightState> {
        self.states.get(doc)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &DocumentId> {
        self.states.keys()
    }

    /// Add a region and re-render the document
    pub fn add<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        doc: &DocumentId,
        kind: HighlightKind,
        range: TextRange,
    ) {
        self.states.entry(doc.clone()).or_default().push(kind, range);
        self.render(surface, doc);
    }

    /// Move (or with None, remove) the cursor marker
    pub fn set_cursor<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        doc: &DocumentId,
        position: Option<Position>,
    ) {
        let state = self.states.entry(doc.clone()).or_default();
        let cursor = position.map(TextRange::at);
        if state.cursor != cursor {
            state.cursor = cursor;
            self.render(surface, doc);
        }
    }

    /// Apply the full region set of a document to the surface
    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S, doc: &DocumentId) {
        let Some(state) = self.states.get(doc) else {
            return;
        };
        let line_count = surface.line_count(doc).unwrap_or(0);
        for kind in HighlightKind::ALL {
            let visible: Vec<TextRange> = state
                .ranges(kind)
                .iter()
                .copied()
                .filter(|range| range.start.line < line_count)
                .collect();
            surface.set_highlights(doc, kind, &visible);
        }
    }

    /// Reapply the last known regions when a document becomes active again
    pub fn focus_changed<S: Surface + ?Sized>(&self, surface: &mut S, doc: &DocumentId) {
        self.render(surface, doc);
    }

    /// Clear every region of every tracked document and forget them
    pub fn clear_all<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        for doc in self.states.keys() {
            for kind in HighlightKind::ALL {
                surface.set_highlights(doc, kind, &[]);
            }
        }
        self.states.clear();
    }
}
