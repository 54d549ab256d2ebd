//! Commit playback engine
//!
//! A session plays a queue of commits. For every commit the full tree is
//! materialized into a temporary directory, the commit's zero-context diff is
//! parsed, and each changed file is replayed in two passes: every touched line
//! is highlighted and cleared (with a settle delay), then the inserted text is
//! typed back one grapheme at a time.
//!
//! Control requests from [`PlaybackControl`] are observed at character, line,
//! file and commit checkpoints.

use crate::control::{Checkpoint, ControlsView, PlaybackControl};
use crate::document::{DocumentId, Position, Reveal, Surface, SurfaceError, TextRange};
use crate::git::{Commit, GitError, HistorySource};
use crate::highlight::{HighlightKind, HighlightTracker};
use crate::patch::{parse_commit_diff, ChangedFile};
use crate::prefs::{NextCommitPreference, PreferenceStore, PrefsError};
use crate::prompt::{
    ask_next_commit, ask_next_file, ask_on_error, ask_remember, CommitDecision, ErrorDecision,
    FileDecision, Prompter, BREAK_MESSAGE,
};
use crate::script::{EditScript, EditStep, InsertTask};
use crate::workspace::{is_binary, TempTrees, WorkspaceError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_SPEED: Duration = Duration::from_millis(50);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

pub const ALL_COMPLETED_MESSAGE: &str = "All commits completed!";
pub const NO_MORE_COMMITS_MESSAGE: &str = "No more commits to play";

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("A playback session is already running")]
    AlreadyPlaying,
    #[error("No commits to play")]
    EmptyQueue,
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-character typing delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingCadence {
    base: Duration,
}

impl TypingCadence {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Half the base for a space or tab, otherwise the base jittered to 0.8-1.2x
    pub fn delay_for<R: Rng + ?Sized>(&self, grapheme: &str, rng: &mut R) -> Duration {
        if grapheme == " " || grapheme == "\t" {
            self.base / 2
        } else {
            self.base.mul_f64(rng.gen_range(0.8..=1.2))
        }
    }
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Base delay per typed character
    pub speed: Duration,
    /// Pause after each cleared line
    pub settle: Duration,
    /// Skip the between-files prompt
    pub auto_play: bool,
    /// Scroll the view to follow the insertion point
    pub follow_cursor: bool,
    /// Key for the saved next-commit preference
    pub workspace_id: String,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            settle: DEFAULT_SETTLE,
            auto_play: false,
            follow_cursor: true,
            workspace_id: String::new(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Stopped,
}

/// Progress of the running session
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub commits: Vec<Commit>,
    pub commit_index: usize,
    pub file_index: usize,
    /// Last insertion point
    pub cursor: Option<Position>,
    pub auto_play: bool,
}

impl PlaybackSession {
    fn new(commits: Vec<Commit>, auto_play: bool) -> Self {
        Self {
            commits,
            commit_index: 0,
            file_index: 0,
            cursor: None,
            auto_play,
        }
    }

    pub fn current(&self) -> Option<&Commit> {
        self.commits.get(self.commit_index)
    }

    pub fn total(&self) -> usize {
        self.commits.len()
    }
}

/// Result of one commit or one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Finished,
    Skipped,
    Stopped,
}

impl From<Checkpoint> for Step {
    fn from(checkpoint: Checkpoint) -> Self {
        match checkpoint {
            Checkpoint::Continue => Step::Finished,
            Checkpoint::Skip => Step::Skipped,
            Checkpoint::Stop => Step::Stopped,
        }
    }
}

pub struct PlaybackEngine<H, S, P> {
    history: H,
    surface: S,
    prompter: P,
    control: PlaybackControl,
    tracker: HighlightTracker,
    trees: TempTrees,
    prefs: PreferenceStore,
    options: PlaybackOptions,
    cadence: TypingCadence,
    rng: StdRng,
    session: Option<PlaybackSession>,
    last_focus: Option<DocumentId>,
}

impl<H: HistorySource, S: Surface, P: Prompter> PlaybackEngine<H, S, P> {
    pub fn new(history: H, surface: S, prompter: P, options: PlaybackOptions) -> Self {
        Self {
            history,
            surface,
            prompter,
            control: PlaybackControl::new(),
            tracker: HighlightTracker::new(),
            trees: TempTrees::default(),
            prefs: PreferenceStore::in_memory(),
            cadence: TypingCadence::new(options.speed),
            options,
            rng: StdRng::from_entropy(),
            session: None,
            last_focus: None,
        }
    }

    /// Share a control handle with the host
    pub fn with_control(mut self, control: PlaybackControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_temp_trees(mut self, trees: TempTrees) -> Self {
        self.trees = trees;
        self
    }

    pub fn with_preferences(mut self, prefs: PreferenceStore) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn control(&self) -> &PlaybackControl {
        &self.control
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn tracker(&self) -> &HighlightTracker {
        &self.tracker
    }

    pub fn temp_trees(&self) -> &TempTrees {
        &self.trees
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Play `commits` in order. Cleanup runs exactly once, whatever the result.
    pub async fn play(&mut self, commits: Vec<Commit>) -> Result<SessionOutcome, PlaybackError> {
        if self.control.is_playing() {
            return Err(PlaybackError::AlreadyPlaying);
        }
        if commits.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        info!(commits = commits.len(), "starting playback");
        self.control.begin_session();
        self.session = Some(PlaybackSession::new(commits, self.options.auto_play));

        let result = self.run_queue().await;
        self.finish();

        match &result {
            Ok(outcome) => info!(?outcome, "playback ended"),
            Err(err) => error!(error = %err, "playback aborted"),
        }
        result
    }

    async fn run_queue(&mut self) -> Result<SessionOutcome, PlaybackError> {
        loop {
            let Some((commit, index, total)) = self.session.as_ref().and_then(|s| {
                s.current()
                    .cloned()
                    .map(|commit| (commit, s.commit_index, s.total()))
            }) else {
                return Ok(SessionOutcome::Completed);
            };

            let step = match self.checkpoint().await {
                Checkpoint::Stop => Step::Stopped,
                Checkpoint::Skip => Step::Skipped,
                Checkpoint::Continue => self.play_commit(&commit, index, total).await?,
            };

            match step {
                Step::Stopped => return Ok(SessionOutcome::Stopped),
                Step::Skipped => {
                    self.control.clear_skip();
                    info!(commit = commit.short_id(), "skipped commit");
                    if index + 1 >= total {
                        self.prompter.notify(NO_MORE_COMMITS_MESSAGE).await;
                        return Ok(SessionOutcome::Completed);
                    }
                }
                Step::Finished => {
                    let Some(next) = self.session.as_ref().and_then(|s| s.commits.get(index + 1))
                    else {
                        self.prompter.notify(ALL_COMPLETED_MESSAGE).await;
                        return Ok(SessionOutcome::Completed);
                    };
                    let next = next.clone();
                    if !self.next_commit_decision(&commit, &next).await {
                        return Ok(SessionOutcome::Stopped);
                    }
                }
            }

            if let Some(session) = self.session.as_mut() {
                session.commit_index = index + 1;
                session.file_index = 0;
            }
        }
    }

    async fn play_commit(
        &mut self,
        commit: &Commit,
        index: usize,
        total: usize,
    ) -> Result<Step, PlaybackError> {
        let mut view = ControlsView {
            position: index + 1,
            total,
            summary: commit.summary().to_string(),
            file: None,
        };
        self.surface.set_controls(Some(&view));

        let materialized = self
            .trees
            .materialize(&self.history, &commit.id, &self.control)
            .await?;
        let Some(tree) = materialized else {
            return Ok(self.checkpoint().await.into());
        };
        let diff = self.history.diff_for_commit(&commit.id)?;
        let files = parse_commit_diff(&diff);
        debug!(commit = commit.short_id(), files = files.len(), "playing commit");

        for (file_index, file) in files.iter().enumerate() {
            if let Some(session) = self.session.as_mut() {
                session.file_index = file_index;
            }
            match self.checkpoint().await {
                Checkpoint::Continue => {}
                other => return Ok(other.into()),
            }

            view.file = Some(file.path.clone());
            self.surface.set_controls(Some(&view));

            match self.play_file(&tree, file).await {
                Ok(None) => continue,
                Ok(Some(Step::Finished)) => {}
                Ok(Some(step)) => return Ok(step),
                Err(err) => {
                    error!(file = %file.path, error = %err, "failed to play file");
                    match ask_on_error(&mut self.prompter, &err).await {
                        ErrorDecision::Continue => continue,
                        ErrorDecision::Stop => return Ok(Step::Stopped),
                    }
                }
            }

            let auto_play = self.session.as_ref().is_some_and(|s| s.auto_play);
            if file_index + 1 < files.len() && !auto_play {
                match ask_next_file(&mut self.prompter, &file.path, file_index + 1, files.len())
                    .await
                {
                    FileDecision::Continue => {}
                    FileDecision::AutoPlay => {
                        if let Some(session) = self.session.as_mut() {
                            session.auto_play = true;
                        }
                    }
                    FileDecision::TakeBreak => {
                        self.prompter.confirm(BREAK_MESSAGE, "Continue").await;
                    }
                    FileDecision::Stop => return Ok(Step::Stopped),
                }
            }
        }

        Ok(Step::Finished)
    }

    /// Replay one file. `None` when the file was skipped as missing or binary.
    async fn play_file(
        &mut self,
        tree: &Path,
        file: &ChangedFile,
    ) -> Result<Option<Step>, PlaybackError> {
        let path = tree.join(&file.path);
        if !path.exists() {
            warn!(file = %file.path, "file not found in materialized tree, skipping");
            return Ok(None);
        }
        if is_binary(&std::fs::read(&path)?) {
            warn!(file = %file.path, "binary file, skipping");
            return Ok(None);
        }

        let doc = self.surface.open(&path)?;
        self.surface.show(&doc)?;
        self.last_focus = Some(doc.clone());

        let script = EditScript::build(file);
        debug!(
            file = %file.path,
            inserted = file.insertions(),
            deleted = file.deletions(),
            clears = script.deletions.len(),
            chars = script.typed_chars(),
            "playing file"
        );

        for step in script.steps() {
            match self.checkpoint().await {
                Checkpoint::Continue => {}
                other => return Ok(Some(other.into())),
            }
            let interrupted = match step {
                EditStep::Clear(line) => {
                    self.clear_line(&doc, line, script.retypes(line)).await?;
                    None
                }
                EditStep::Type(task) => self.type_task(&doc, task).await?,
            };
            if let Some(checkpoint) = interrupted {
                self.tracker.set_cursor(&mut self.surface, &doc, None);
                return Ok(Some(checkpoint.into()));
            }
        }

        self.tracker.set_cursor(&mut self.surface, &doc, None);
        Ok(Some(Step::Finished))
    }

    /// Type one insertion a grapheme at a time. Returns the checkpoint that
    /// interrupted it, if any; typed text keeps its highlight either way.
    async fn type_task(
        &mut self,
        doc: &DocumentId,
        task: &InsertTask,
    ) -> Result<Option<Checkpoint>, PlaybackError> {
        let start = Position::new(task.line, task.column);
        let mut cursor = start;
        let mut interrupted = None;
        for grapheme in task.text.graphemes(true) {
            match self.checkpoint().await {
                Checkpoint::Continue => {}
                other => {
                    interrupted = Some(other);
                    break;
                }
            }
            self.surface.replace(doc, TextRange::at(cursor), grapheme)?;
            cursor.column += grapheme.chars().count();
            self.move_cursor(doc, cursor);
            tokio::time::sleep(self.cadence.delay_for(grapheme, &mut self.rng)).await;
        }

        self.tracker.add(
            &mut self.surface,
            doc,
            HighlightKind::Addition,
            TextRange::new(start, cursor),
        );
        Ok(interrupted)
    }

    /// Highlight then clear a line. Empty or missing lines are left alone.
    async fn clear_line(
        &mut self,
        doc: &DocumentId,
        line: usize,
        retyped: bool,
    ) -> Result<(), PlaybackError> {
        if line >= self.surface.line_count(doc)? {
            debug!(line, "cleared line is past the end of the document");
            return Ok(());
        }
        let len = self.surface.line(doc, line)?.chars().count();
        if len == 0 {
            return Ok(());
        }

        let range = TextRange::line(line, len);
        let kind = if retyped {
            HighlightKind::Modification
        } else {
            HighlightKind::Deletion
        };
        self.tracker.add(&mut self.surface, doc, kind, range);
        self.surface.reveal(doc, range, Reveal::Center);
        self.surface.replace(doc, range, "")?;
        tokio::time::sleep(self.options.settle).await;
        Ok(())
    }

    fn move_cursor(&mut self, doc: &DocumentId, cursor: Position) {
        self.surface.set_selection(doc, cursor);
        self.tracker.set_cursor(&mut self.surface, doc, Some(cursor));
        if self.options.follow_cursor {
            self.surface
                .reveal(doc, TextRange::at(cursor), Reveal::CenterIfOutside);
        }
        if let Some(session) = self.session.as_mut() {
            session.cursor = Some(cursor);
        }
    }

    async fn next_commit_decision(&mut self, finished: &Commit, next: &Commit) -> bool {
        let workspace = self.options.workspace_id.clone();
        match self.prefs.get(&workspace) {
            Some(NextCommitPreference::Always) => {
                debug!("saved preference: always continue");
                return true;
            }
            Some(NextCommitPreference::Never) => {
                debug!("saved preference: never continue");
                return false;
            }
            None => {}
        }

        let proceed = match ask_next_commit(&mut self.prompter, finished, next).await {
            CommitDecision::TakeBreak => {
                self.prompter.confirm(BREAK_MESSAGE, "Continue").await;
                return !self.control.stop_requested();
            }
            CommitDecision::Continue => true,
            CommitDecision::Stop => false,
        };
        if self.control.stop_requested() {
            return false;
        }

        if ask_remember(&mut self.prompter).await {
            let preference = if proceed {
                NextCommitPreference::Always
            } else {
                NextCommitPreference::Never
            };
            if let Err(err) = self.prefs.set(&workspace, preference) {
                warn!(error = %err, "failed to save next-commit preference");
            }
        }
        proceed
    }

    /// Control checkpoint plus a focus check: regions are reapplied when the
    /// host switched to another document since the last checkpoint.
    async fn checkpoint(&mut self) -> Checkpoint {
        let checkpoint = self.control.checkpoint().await;
        if let Some(active) = self.surface.active() {
            if self.last_focus.as_ref() != Some(&active) {
                self.tracker.focus_changed(&mut self.surface, &active);
                self.last_focus = Some(active);
            }
        }
        checkpoint
    }

    fn finish(&mut self) {
        self.tracker.clear_all(&mut self.surface);
        self.trees.cleanup();
        self.surface.set_controls(None);
        self.session = None;
        self.last_focus = None;
        self.control.end_session();
    }
}
