//! Retype core - replay git history as a live typing session
//!
//! A commit's zero-context diff is parsed into per-file changes, turned into a
//! two-phase edit script (clear every touched line, then retype insertions) and
//! played against an editing [`Surface`] with humanlike typing delays.

pub mod control;
pub mod document;
pub mod git;
pub mod highlight;
pub mod patch;
pub mod playback;
pub mod prefs;
pub mod prompt;
pub mod script;
pub mod workspace;

pub use control::{ControlsView, PlaybackControl, PlaybackState};
pub use document::{
    DocumentId, MemoryDocument, MemorySurface, Position, Reveal, Surface, SurfaceError, TextRange,
};
pub use git::{Commit, GitCli, GitError, HistorySource};
pub use highlight::{HighlightKind, HighlightState, HighlightTracker};
pub use patch::{parse_commit_diff, Change, ChangedFile};
pub use playback::{
    PlaybackEngine, PlaybackError, PlaybackOptions, PlaybackSession, SessionOutcome,
    TypingCadence,
};
pub use prefs::{NextCommitPreference, PreferenceStore, PrefsError};
pub use prompt::Prompter;
pub use script::{EditScript, EditStep, InsertTask};
pub use workspace::{TempTrees, WorkspaceError};
