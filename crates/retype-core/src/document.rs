//! Editing surface: documents, coordinates and the in-memory line buffer

use crate::control::ControlsView;
use crate::highlight::HighlightKind;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Document is not open: {0}")]
    UnknownDocument(DocumentId),
    #[error("Line {line} is out of range ({count} lines)")]
    LineOutOfRange { line: usize, count: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 0-based line/column position. Columns count chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Half-open range between two positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Zero-width range at a position
    pub fn at(position: Position) -> Self {
        Self::new(position, position)
    }

    /// The first `len` columns of a line
    pub fn line(line: usize, len: usize) -> Self {
        Self::new(Position::new(line, 0), Position::new(line, len))
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start.line <= line && line <= self.end.line
    }
}

/// Identity of an opened document (its on-disk path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(PathBuf);

impl DocumentId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// How to scroll a range into view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    Center,
    CenterIfOutside,
}

/// The host editing surface playback types into
pub trait Surface {
    /// Open a document from a path. Reopening returns the same identity.
    fn open(&mut self, path: &Path) -> Result<DocumentId, SurfaceError>;
    /// Show the document in the view, making it active
    fn show(&mut self, doc: &DocumentId) -> Result<(), SurfaceError>;
    /// Currently active document, if any
    fn active(&self) -> Option<DocumentId>;
    fn line_count(&self, doc: &DocumentId) -> Result<usize, SurfaceError>;
    fn line(&self, doc: &DocumentId, line: usize) -> Result<String, SurfaceError>;
    /// Replace the text in a range
    fn replace(&mut self, doc: &DocumentId, range: TextRange, text: &str)
        -> Result<(), SurfaceError>;
    /// Replace the full set of ranges styled with `kind`
    fn set_highlights(&mut self, doc: &DocumentId, kind: HighlightKind, ranges: &[TextRange]);
    fn set_selection(&mut self, doc: &DocumentId, position: Position);
    fn reveal(&mut self, doc: &DocumentId, range: TextRange, mode: Reveal);
    /// Show or hide (None) the playback controls
    fn set_controls(&mut self, controls: Option<&ControlsView>);
}

/// An opened document held as lines
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    id: DocumentId,
    lines: Vec<String>,
    crlf: bool,
    highlights: HashMap<HighlightKind, Vec<TextRange>>,
    selection: Option<Position>,
    revealed: Option<TextRange>,
}

impl MemoryDocument {
    pub fn from_text(id: DocumentId, text: &str) -> Self {
        let crlf = text.contains("\r\n");
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        Self {
            id,
            lines,
            crlf,
            highlights: HashMap::new(),
            selection: None,
            revealed: None,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join(if self.crlf { "\r\n" } else { "\n" })
    }

    pub fn highlights(&self, kind: HighlightKind) -> &[TextRange] {
        self.highlights.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights.values().map(Vec::len).sum()
    }

    pub fn selection(&self) -> Option<Position> {
        self.selection
    }

    pub fn revealed(&self) -> Option<TextRange> {
        self.revealed
    }

    /// Byte offset of a char column, clamped to the line end
    fn byte_offset(line: &str, column: usize) -> usize {
        line.char_indices()
            .nth(column)
            .map(|(idx, _)| idx)
            .unwrap_or(line.len())
    }

    fn replace(&mut self, range: TextRange, text: &str) {
        // Typing past the end of the buffer grows it
        while self.lines.len() <= range.end.line {
            self.lines.push(String::new());
        }

        let start_line = &self.lines[range.start.line];
        let head = start_line[..Self::byte_offset(start_line, range.start.column)].to_string();
        let end_line = &self.lines[range.end.line];
        let tail = end_line[Self::byte_offset(end_line, range.end.column)..].to_string();

        let mut replacement: Vec<String> = text.split('\n').map(str::to_string).collect();
        if let Some(first) = replacement.first_mut() {
            first.insert_str(0, &head);
        }
        if let Some(last) = replacement.last_mut() {
            last.push_str(&tail);
        }

        self.lines
            .splice(range.start.line..=range.end.line, replacement);
    }
}

/// In-memory editing surface
#[derive(Debug, Default)]
pub struct MemorySurface {
    documents: Vec<MemoryDocument>,
    active: Option<DocumentId>,
    controls: Option<ControlsView>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, doc: &DocumentId) -> Option<&MemoryDocument> {
        self.documents.iter().find(|d| &d.id == doc)
    }

    pub fn documents(&self) -> impl Iterator<Item = &MemoryDocument> {
        self.documents.iter()
    }

    /// Document at `path`, if opened
    pub fn document_at(&self, path: &Path) -> Option<&MemoryDocument> {
        self.documents.iter().find(|d| d.id.path() == path)
    }

    /// Switch focus to another opened document
    pub fn activate(&mut self, doc: &DocumentId) -> bool {
        if self.document(doc).is_some() {
            self.active = Some(doc.clone());
            true
        } else {
            false
        }
    }

    /// Focus the next opened document after the active one
    pub fn cycle_active(&mut self) -> Option<DocumentId> {
        if self.documents.is_empty() {
            return None;
        }
        let next = match &self.active {
            Some(active) => self
                .documents
                .iter()
                .position(|d| &d.id == active)
                .map(|idx| (idx + 1) % self.documents.len())
                .unwrap_or(0),
            None => 0,
        };
        self.active = Some(self.documents[next].id.clone());
        self.active.clone()
    }

    /// Drop the view's styling for a document, as hosts do when a tab is hidden
    pub fn forget_highlights(&mut self, doc: &DocumentId) {
        if let Some(document) = self.documents.iter_mut().find(|d| &d.id == doc) {
            document.highlights.clear();
        }
    }

    pub fn controls(&self) -> Option<&ControlsView> {
        self.controls.as_ref()
    }

    fn document_mut(&mut self, doc: &DocumentId) -> Result<&mut MemoryDocument, SurfaceError> {
        self.documents
            .iter_mut()
            .find(|d| &d.id == doc)
            .ok_or_else(|| SurfaceError::UnknownDocument(doc.clone()))
    }

    fn existing(&self, doc: &DocumentId) -> Result<&MemoryDocument, SurfaceError> {
        self.document(doc)
            .ok_or_else(|| SurfaceError::UnknownDocument(doc.clone()))
    }
}

impl Surface for MemorySurface {
    fn open(&mut self, path: &Path) -> Result<DocumentId, SurfaceError> {
        let id = DocumentId::new(path);
        if self.document(&id).is_none() {
            let bytes = std::fs::read(path)?;
            let text = String::from_utf8_lossy(&bytes);
            self.documents.push(MemoryDocument::from_text(id.clone(), &text));
        }
        Ok(id)
    }

    fn show(&mut self, doc: &DocumentId) -> Result<(), SurfaceError> {
        self.existing(doc)?;
        self.active = Some(doc.clone());
        Ok(())
    }

    fn active(&self) -> Option<DocumentId> {
        self.active.clone()
    }

    fn line_count(&self, doc: &DocumentId) -> Result<usize, SurfaceError> {
        Ok(self.existing(doc)?.lines.len())
    }

    fn line(&self, doc: &DocumentId, line: usize) -> Result<String, SurfaceError> {
        let document = self.existing(doc)?;
        document
            .lines
            .get(line)
            .cloned()
            .ok_or(SurfaceError::LineOutOfRange {
                line,
                count: document.lines.len(),
            })
    }

    fn replace(
        &mut self,
        doc: &DocumentId,
        range: TextRange,
        text: &str,
    ) -> Result<(), SurfaceError> {
        self.document_mut(doc)?.replace(range, text);
        Ok(())
    }

    fn set_highlights(&mut self, doc: &DocumentId, kind: HighlightKind, ranges: &[TextRange]) {
        if let Ok(document) = self.document_mut(doc) {
            if ranges.is_empty() {
                document.highlights.remove(&kind);
            } else {
                document.highlights.insert(kind, ranges.to_vec());
            }
        }
    }

    fn set_selection(&mut self, doc: &DocumentId, position: Position) {
        if let Ok(document) = self.document_mut(doc) {
            document.selection = Some(position);
        }
    }

    fn reveal(&mut self, doc: &DocumentId, range: TextRange, _mode: Reveal) {
        if let Ok(document) = self.document_mut(doc) {
            document.revealed = Some(range);
        }
    }

    fn set_controls(&mut self, controls: Option<&ControlsView>) {
        self.controls = controls.cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> MemoryDocument {
        MemoryDocument::from_text(DocumentId::new("mem.txt"), text)
    }

    #[test]
    fn test_insert_char_mid_line() {
        let mut document = doc("helo\nworld");
        document.replace(TextRange::at(Position::new(0, 3)), "l");
        assert_eq!(document.text(), "hello\nworld");
    }

    #[test]
    fn test_clear_line_keeps_line() {
        let mut document = doc("one\ntwo\nthree");
        document.replace(TextRange::line(1, 3), "");
        assert_eq!(document.lines(), &["one", "", "three"]);
    }

    #[test]
    fn test_typing_past_end_grows_buffer() {
        let mut document = doc("");
        document.replace(TextRange::at(Position::new(2, 0)), "x");
        assert_eq!(document.lines(), &["", "", "x"]);
    }

    #[test]
    fn test_multiline_replace() {
        let mut document = doc("abc\ndef\nghi");
        document.replace(
            TextRange::new(Position::new(0, 1), Position::new(2, 1)),
            "X\nY",
        );
        assert_eq!(document.lines(), &["aX", "Yhi"]);
    }

    #[test]
    fn test_columns_are_chars() {
        let mut document = doc("héllo");
        document.replace(TextRange::new(Position::new(0, 1), Position::new(0, 2)), "e");
        assert_eq!(document.text(), "hello");
        document.replace(TextRange::at(Position::new(0, 99)), "!");
        assert_eq!(document.text(), "hello!");
    }

    #[test]
    fn test_crlf_round_trip() {
        let document = doc("a\r\nb\r\n");
        assert_eq!(document.lines(), &["a", "b", ""]);
        assert_eq!(document.text(), "a\r\nb\r\n");
    }

    #[test]
    fn test_range_normalizes_order() {
        let range = TextRange::new(Position::new(3, 1), Position::new(1, 0));
        assert_eq!(range.start, Position::new(1, 0));
        assert!(range.contains_line(2));
        assert!(!range.contains_line(4));
    }

    #[test]
    fn test_surface_open_and_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&b, "beta").unwrap();

        let mut surface = MemorySurface::new();
        let doc_a = surface.open(&a).unwrap();
        let doc_b = surface.open(&b).unwrap();
        assert_eq!(surface.open(&a).unwrap(), doc_a);
        assert_eq!(surface.documents().count(), 2);

        surface.show(&doc_a).unwrap();
        assert_eq!(surface.cycle_active(), Some(doc_b.clone()));
        assert_eq!(surface.cycle_active(), Some(doc_a.clone()));
        assert_eq!(surface.line(&doc_b, 0).unwrap(), "beta");
        assert!(matches!(
            surface.line(&doc_b, 4),
            Err(SurfaceError::LineOutOfRange { line: 4, count: 1 })
        ));
    }

    #[test]
    fn test_unknown_document() {
        let mut surface = MemorySurface::new();
        let missing = DocumentId::new("nowhere");
        assert!(surface.show(&missing).is_err());
        assert!(surface.replace(&missing, TextRange::default(), "x").is_err());
    }
}
