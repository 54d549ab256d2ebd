//! Pause/skip/stop signalling between the host and a running session
//!
//! Control is cooperative: requests set flags that the engine observes at its
//! checkpoints (character, line, file and commit boundaries). Nothing preempts
//! an in-flight single-character edit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Interval for pause and stop-and-wait polling
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observable playback states. A finished session reads as `Idle` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    /// Skip requested, not yet reached by the engine
    Skipped,
    /// Stop requested, cleanup pending
    Stopped,
}

/// What the engine should do after a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Skip,
    Stop,
}

#[derive(Debug, Default)]
struct Flags {
    playing: AtomicBool,
    paused: AtomicBool,
    skip: AtomicBool,
    stop: AtomicBool,
}

/// Clonable handle onto a session's control flags
#[derive(Debug, Clone, Default)]
pub struct PlaybackControl {
    flags: Arc<Flags>,
}

impl PlaybackControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.flags.playing.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn skip_requested(&self) -> bool {
        self.flags.skip.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    /// Current state as seen from outside the engine
    pub fn state(&self) -> PlaybackState {
        if !self.is_playing() {
            PlaybackState::Idle
        } else if self.stop_requested() {
            PlaybackState::Stopped
        } else if self.skip_requested() {
            PlaybackState::Skipped
        } else if self.is_paused() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    /// Flip pause. Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        !self.flags.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    /// Abandon the current commit. Ignored when no session is running.
    pub fn request_skip(&self) {
        if self.is_playing() {
            self.flags.skip.store(true, Ordering::SeqCst);
        }
    }

    pub fn request_stop(&self) {
        if self.is_playing() {
            self.flags.stop.store(true, Ordering::SeqCst);
        }
    }

    /// Request stop and wait until the session has cleaned up
    pub async fn stop_and_wait(&self) {
        self.request_stop();
        while self.is_playing() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub(crate) fn begin_session(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
        self.flags.skip.store(false, Ordering::SeqCst);
        self.flags.stop.store(false, Ordering::SeqCst);
        self.flags.playing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn end_session(&self) {
        self.flags.playing.store(false, Ordering::SeqCst);
        self.flags.paused.store(false, Ordering::SeqCst);
        self.flags.skip.store(false, Ordering::SeqCst);
        self.flags.stop.store(false, Ordering::SeqCst);
    }

    pub(crate) fn clear_skip(&self) {
        self.flags.skip.store(false, Ordering::SeqCst);
    }

    /// Wait out a pause, then report pending skip/stop requests.
    ///
    /// Skip and stop end the wait early, so a paused session can still be
    /// abandoned.
    pub(crate) async fn checkpoint(&self) -> Checkpoint {
        while self.is_paused() && !self.stop_requested() && !self.skip_requested() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        if self.stop_requested() {
            Checkpoint::Stop
        } else if self.skip_requested() {
            Checkpoint::Skip
        } else {
            Checkpoint::Continue
        }
    }
}

/// Status shown by the playback controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlsView {
    /// 1-based position of the current commit in the queue
    pub position: usize,
    pub total: usize,
    pub summary: String,
    /// File being typed, if any
    pub file: Option<String>,
}

impl ControlsView {
    pub fn title(&self) -> String {
        format!("Commit {}/{}: {}", self.position, self.total, self.summary)
    }
}
