//! View state shared by the playback engine and the terminal loop
//!
//! The engine writes through [`TerminalSurface`] and asks questions through
//! [`TerminalPrompter`]; the event loop reads the same [`Screen`] to draw and
//! resolves prompts from key presses. Everything runs on one task, so a
//! `RefCell` borrow is never held across an await point.

use retype_core::workspace::TREE_PREFIX;
use retype_core::{
    ControlsView, DocumentId, HighlightKind, MemorySurface, Position, Prompter, Reveal, Surface,
    SurfaceError, TextRange,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path};
use std::rc::Rc;
use tokio::sync::oneshot;

pub type SharedScreen = Rc<RefCell<Screen>>;

/// Entries of the controls menu, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    TogglePause,
    Skip,
    Stop,
}

impl ControlAction {
    pub const ALL: [ControlAction; 3] = [
        ControlAction::TogglePause,
        ControlAction::Skip,
        ControlAction::Stop,
    ];

    pub fn label(self, paused: bool) -> &'static str {
        match self {
            ControlAction::TogglePause if paused => "Resume",
            ControlAction::TogglePause => "Pause",
            ControlAction::Skip => "Skip commit",
            ControlAction::Stop => "Stop playback",
        }
    }
}

enum PopupKind {
    /// An engine question waiting for an answer
    Prompt(oneshot::Sender<Option<usize>>),
    Controls,
}

pub struct Popup {
    pub title: String,
    pub options: Vec<String>,
    pub selected: usize,
    kind: PopupKind,
}

impl Popup {
    pub fn is_controls(&self) -> bool {
        matches!(self.kind, PopupKind::Controls)
    }

    pub fn select_next(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + 1) % self.options.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.options.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.options.len() - 1);
        }
    }

    /// Answer the popup. Returns the chosen controls action, if any.
    fn resolve(self, choice: Option<usize>) -> Option<ControlAction> {
        match self.kind {
            PopupKind::Prompt(reply) => {
                let _ = reply.send(choice);
                None
            }
            PopupKind::Controls => choice.and_then(|idx| ControlAction::ALL.get(idx).copied()),
        }
    }
}

#[derive(Default)]
pub struct Screen {
    pub surface: MemorySurface,
    pub popup: Option<Popup>,
    /// First visible line per document
    pub scroll: HashMap<DocumentId, usize>,
    /// Text rows available for the document, updated on every draw
    pub viewport_height: usize,
    /// Last notification, kept on the status line
    pub message: Option<String>,
}

impl Screen {
    pub fn shared() -> SharedScreen {
        Rc::new(RefCell::new(Screen::default()))
    }

    /// Show an engine question, replacing (and dismissing) any open popup
    pub fn open_prompt(
        &mut self,
        title: &str,
        options: Vec<String>,
    ) -> oneshot::Receiver<Option<usize>> {
        let (tx, rx) = oneshot::channel();
        self.dismiss();
        self.popup = Some(Popup {
            title: title.to_string(),
            options,
            selected: 0,
            kind: PopupKind::Prompt(tx),
        });
        rx
    }

    /// Open the controls menu unless a question is waiting
    pub fn open_controls(&mut self, paused: bool) {
        if self.popup.is_some() {
            return;
        }
        self.popup = Some(Popup {
            title: "Playback controls".to_string(),
            options: ControlAction::ALL
                .iter()
                .map(|action| action.label(paused).to_string())
                .collect(),
            selected: 0,
            kind: PopupKind::Controls,
        });
    }

    /// Close the popup without an answer
    pub fn dismiss(&mut self) {
        if let Some(popup) = self.popup.take() {
            popup.resolve(None);
        }
    }

    /// Answer the popup with its selected option
    pub fn accept(&mut self) -> Option<ControlAction> {
        let popup = self.popup.take()?;
        let selected = popup.selected;
        popup.resolve(Some(selected))
    }

    pub fn top_line(&self, doc: &DocumentId) -> usize {
        self.scroll.get(doc).copied().unwrap_or(0)
    }

    fn reveal_line(&mut self, doc: &DocumentId, line: usize, mode: Reveal) {
        let height = self.viewport_height.max(1);
        let top = self.top_line(doc);
        let outside = line < top || line >= top + height;
        if mode == Reveal::Center || outside {
            self.scroll
                .insert(doc.clone(), line.saturating_sub(height / 2));
        }
    }
}

/// Path of a document inside its materialized commit tree
pub fn display_path(path: &Path) -> String {
    let components: Vec<Component> = path.components().collect();
    let tree = components.iter().rposition(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.starts_with(TREE_PREFIX))
    });
    match tree {
        Some(idx) => components[idx + 1..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        None => path.display().to_string(),
    }
}

/// [`Surface`] that writes into the shared screen
#[derive(Clone)]
pub struct TerminalSurface {
    screen: SharedScreen,
}

impl TerminalSurface {
    pub fn new(screen: SharedScreen) -> Self {
        Self { screen }
    }
}

impl Surface for TerminalSurface {
    fn open(&mut self, path: &Path) -> Result<DocumentId, SurfaceError> {
        self.screen.borrow_mut().surface.open(path)
    }

    fn show(&mut self, doc: &DocumentId) -> Result<(), SurfaceError> {
        self.screen.borrow_mut().surface.show(doc)
    }

    fn active(&self) -> Option<DocumentId> {
        self.screen.borrow().surface.active()
    }

    fn line_count(&self, doc: &DocumentId) -> Result<usize, SurfaceError> {
        self.screen.borrow().surface.line_count(doc)
    }

    fn line(&self, doc: &DocumentId, line: usize) -> Result<String, SurfaceError> {
        self.screen.borrow().surface.line(doc, line)
    }

    fn replace(
        &mut self,
        doc: &DocumentId,
        range: TextRange,
        text: &str,
    ) -> Result<(), SurfaceError> {
        self.screen.borrow_mut().surface.replace(doc, range, text)
    }

    fn set_highlights(&mut self, doc: &DocumentId, kind: HighlightKind, ranges: &[TextRange]) {
        self.screen
            .borrow_mut()
            .surface
            .set_highlights(doc, kind, ranges)
    }

    fn set_selection(&mut self, doc: &DocumentId, position: Position) {
        self.screen.borrow_mut().surface.set_selection(doc, position)
    }

    fn reveal(&mut self, doc: &DocumentId, range: TextRange, mode: Reveal) {
        let mut screen = self.screen.borrow_mut();
        screen.surface.reveal(doc, range, mode);
        screen.reveal_line(doc, range.start.line, mode);
    }

    fn set_controls(&mut self, controls: Option<&ControlsView>) {
        self.screen.borrow_mut().surface.set_controls(controls)
    }
}

/// [`Prompter`] that shows popups on the shared screen
pub struct TerminalPrompter {
    screen: SharedScreen,
}

impl TerminalPrompter {
    pub fn new(screen: SharedScreen) -> Self {
        Self { screen }
    }
}

impl Prompter for TerminalPrompter {
    async fn choose(&mut self, title: &str, options: &[String]) -> Option<usize> {
        let reply = self
            .screen
            .borrow_mut()
            .open_prompt(title, options.to_vec());
        reply.await.ok().flatten()
    }

    async fn notify(&mut self, message: &str) {
        self.screen.borrow_mut().message = Some(message.to_string());
        self.choose(message, &["OK".to_string()]).await;
    }

    async fn confirm(&mut self, message: &str, button: &str) {
        self.choose(message, &[button.to_string()]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_display_path_strips_tree() {
        let path = PathBuf::from("/tmp/retype-abc123/src/lib.rs");
        assert_eq!(display_path(&path), "src/lib.rs");
        assert_eq!(display_path(Path::new("/plain/file.rs")), "/plain/file.rs");
    }

    #[test]
    fn test_popup_selection_wraps() {
        let mut screen = Screen::default();
        let _reply = screen.open_prompt("Pick", vec!["a".into(), "b".into()]);
        let popup = screen.popup.as_mut().unwrap();
        popup.select_prev();
        assert_eq!(popup.selected, 1);
        popup.select_next();
        assert_eq!(popup.selected, 0);
    }

    #[test]
    fn test_prompt_reply() {
        let mut screen = Screen::default();
        let mut reply = screen.open_prompt("Pick", vec!["a".into(), "b".into()]);
        screen.popup.as_mut().unwrap().select_next();
        assert_eq!(screen.accept(), None);
        assert_eq!(reply.try_recv().unwrap(), Some(1));
        assert!(screen.popup.is_none());
    }

    #[test]
    fn test_new_prompt_dismisses_old() {
        let mut screen = Screen::default();
        let mut first = screen.open_prompt("One", vec!["x".into()]);
        let _second = screen.open_prompt("Two", vec!["y".into()]);
        assert_eq!(first.try_recv().unwrap(), None);
        assert_eq!(screen.popup.as_ref().unwrap().title, "Two");
    }

    #[test]
    fn test_controls_menu() {
        let mut screen = Screen::default();
        screen.open_controls(true);
        let popup = screen.popup.as_mut().unwrap();
        assert!(popup.is_controls());
        assert_eq!(popup.options[0], "Resume");
        popup.select_next();
        popup.select_next();
        assert_eq!(screen.accept(), Some(ControlAction::Stop));
    }

    #[test]
    fn test_controls_do_not_cover_questions() {
        let mut screen = Screen::default();
        let _reply = screen.open_prompt("Continue?", vec!["Yes".into()]);
        screen.open_controls(false);
        assert!(!screen.popup.as_ref().unwrap().is_controls());
    }

    #[test]
    fn test_reveal_scrolls_only_when_outside() {
        let mut screen = Screen {
            viewport_height: 10,
            ..Screen::default()
        };
        let doc = DocumentId::new("f");
        screen.reveal_line(&doc, 4, Reveal::CenterIfOutside);
        assert_eq!(screen.top_line(&doc), 0);
        screen.reveal_line(&doc, 25, Reveal::CenterIfOutside);
        assert_eq!(screen.top_line(&doc), 20);
        screen.reveal_line(&doc, 22, Reveal::Center);
        assert_eq!(screen.top_line(&doc), 17);
    }
}
