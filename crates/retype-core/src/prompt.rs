//! User prompts asked between commits, between files and on errors

use crate::git::Commit;

/// The host's prompt surface
#[allow(async_fn_in_trait)]
pub trait Prompter {
    /// Single choice from a labeled list. `None` when dismissed.
    async fn choose(&mut self, title: &str, options: &[String]) -> Option<usize>;
    /// Informational message
    async fn notify(&mut self, message: &str);
    /// Modal message that returns once acknowledged with `button`
    async fn confirm(&mut self, message: &str, button: &str);
}

/// Answer after a commit finished playing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    Continue,
    TakeBreak,
    Stop,
}

/// Answer after a file finished playing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDecision {
    Continue,
    AutoPlay,
    TakeBreak,
    Stop,
}

/// Answer after a file failed to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDecision {
    Continue,
    Stop,
}

pub const BREAK_MESSAGE: &str = "Press Continue when ready to proceed.";

fn labels(options: &[&str]) -> Vec<String> {
    options.iter().map(|s| s.to_string()).collect()
}

pub async fn ask_next_commit<P: Prompter>(
    prompter: &mut P,
    finished: &Commit,
    next: &Commit,
) -> CommitDecision {
    let title = format!(
        "Commit \"{}\" completed. Continue to the next commit?\nNext: {}",
        finished.summary(),
        next.summary()
    );
    match prompter
        .choose(&title, &labels(&["Continue", "Take a Break", "Stop"]))
        .await
    {
        Some(0) => CommitDecision::Continue,
        Some(1) => CommitDecision::TakeBreak,
        _ => CommitDecision::Stop,
    }
}

pub async fn ask_next_file<P: Prompter>(
    prompter: &mut P,
    finished_path: &str,
    position: usize,
    total: usize,
) -> FileDecision {
    let name = finished_path.rsplit('/').next().unwrap_or(finished_path);
    let title = format!("Finished file {name} ({position}/{total}). Ready for the next file?");
    match prompter
        .choose(&title, &labels(&["Continue", "Auto-play", "Take a Break"]))
        .await
    {
        Some(0) => FileDecision::Continue,
        Some(1) => FileDecision::AutoPlay,
        Some(2) => FileDecision::TakeBreak,
        _ => FileDecision::Stop,
    }
}

pub async fn ask_on_error<P: Prompter>(
    prompter: &mut P,
    error: &dyn std::error::Error,
) -> ErrorDecision {
    let title = format!("Error during playback: {error}");
    match prompter.choose(&title, &labels(&["Continue", "Stop"])).await {
        Some(0) => ErrorDecision::Continue,
        _ => ErrorDecision::Stop,
    }
}

/// Whether to remember a continue/stop answer for this workspace
pub async fn ask_remember<P: Prompter>(prompter: &mut P) -> bool {
    let title = "Remember this choice for this workspace?";
    matches!(
        prompter
            .choose(title, &labels(&["Yes, remember my choice", "No, ask me each time"]))
            .await,
        Some(0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        answers: VecDeque<Option<usize>>,
        titles: Vec<String>,
    }

    impl Prompter for Scripted {
        async fn choose(&mut self, title: &str, _options: &[String]) -> Option<usize> {
            self.titles.push(title.to_string());
            self.answers.pop_front().flatten()
        }

        async fn notify(&mut self, _message: &str) {}

        async fn confirm(&mut self, _message: &str, _button: &str) {}
    }

    fn commit(summary: &str) -> Commit {
        Commit {
            id: "0000000000".into(),
            message: format!("{summary}\n\nbody"),
            author: "Ada".into(),
            author_time: None,
        }
    }

    #[tokio::test]
    async fn test_commit_decisions() {
        let mut prompter = Scripted {
            answers: VecDeque::from([Some(0), Some(1), Some(2), None]),
            titles: Vec::new(),
        };
        let (a, b) = (commit("first"), commit("second"));

        assert_eq!(ask_next_commit(&mut prompter, &a, &b).await, CommitDecision::Continue);
        assert_eq!(ask_next_commit(&mut prompter, &a, &b).await, CommitDecision::TakeBreak);
        assert_eq!(ask_next_commit(&mut prompter, &a, &b).await, CommitDecision::Stop);
        assert_eq!(ask_next_commit(&mut prompter, &a, &b).await, CommitDecision::Stop);
        assert!(prompter.titles[0].contains("Next: second"));
    }

    #[tokio::test]
    async fn test_file_decisions_use_file_name() {
        let mut prompter = Scripted {
            answers: VecDeque::from([Some(1), None]),
            titles: Vec::new(),
        };

        assert_eq!(
            ask_next_file(&mut prompter, "src/deep/mod.rs", 1, 3).await,
            FileDecision::AutoPlay
        );
        assert_eq!(
            ask_next_file(&mut prompter, "src/deep/mod.rs", 2, 3).await,
            FileDecision::Stop
        );
        assert!(prompter.titles[0].starts_with("Finished file mod.rs (1/3)"));
    }

    #[tokio::test]
    async fn test_remember_defaults_to_no() {
        let mut prompter = Scripted {
            answers: VecDeque::from([None, Some(0)]),
            titles: Vec::new(),
        };
        assert!(!ask_remember(&mut prompter).await);
        assert!(ask_remember(&mut prompter).await);
    }
}
