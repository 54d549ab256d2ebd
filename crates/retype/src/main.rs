//! Retype CLI - replay git history as live typing

mod config;
mod input;
mod screen;
mod time_format;
mod tui;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, Theme};
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::{FutureExt, StreamExt};
use retype_core::control::POLL_INTERVAL;
use retype_core::{
    Commit, GitCli, GitError, HistorySource, NextCommitPreference, PlaybackControl,
    PlaybackEngine, PlaybackOptions, PreferenceStore, Prompter, SessionOutcome,
};
use screen::{Screen, SharedScreen, TerminalPrompter, TerminalSurface};
use serde::Serialize;
use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Mutex;
use std::time::Duration;
use time_format::TimeFormatter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tui::Tui;

/// About 30 frames per second
const FRAME: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(name = "retype")]
#[command(author, version, about = "Replay a git history as a live typing session")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Repository to read history from
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Write logs to this file (filter with RETYPE_LOG)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play commits as typing (default)
    Play(PlayArgs),
    /// List the commit history
    Log {
        /// Show at most this many commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show or reset the saved next-commit preference
    Prefs {
        /// Forget the preference for this repository
        #[arg(long)]
        reset: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
struct PlayArgs {
    /// Start from this revision (HEAD, HEAD~N or a hash prefix) instead of picking
    #[arg(long)]
    from: Option<String>,

    /// Typing speed in milliseconds per character
    #[arg(short, long)]
    speed: Option<u64>,

    /// Do not ask between files
    #[arg(long)]
    auto_play: bool,
}

#[derive(Serialize)]
struct LogEntry<'a> {
    id: &'a str,
    short_id: &'a str,
    author: &'a str,
    time: String,
    summary: &'a str,
    body: &'a str,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = start(&args)?;

    match args.command {
        Some(Command::Log { limit, json }) => {
            let git = open_repo(&args.repo)?;
            run_log(&git, &config, limit, json)
        }
        Some(Command::Prefs { reset }) => {
            let git = open_repo(&args.repo)?;
            run_prefs(&git, reset)
        }
        Some(Command::Play(play)) => run_play(&args.repo, &config, play).await,
        None => run_play(&args.repo, &config, PlayArgs::default()).await,
    }
}

/// Install logging, then load the config so its warnings are recorded
fn start(args: &Args) -> Result<Config> {
    // Only the TUI keeps stderr clear
    let stderr = matches!(args.command, Some(Command::Log { .. } | Command::Prefs { .. }));
    init_logging(args.log_file.as_deref(), stderr)?;
    Ok(Config::load())
}

/// Logs go to `log_file` when given, otherwise to stderr unless the TUI owns the screen
fn init_logging(log_file: Option<&Path>, stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env("RETYPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if let Some(path) = log_file {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .try_init()
            .context("Failed to install logger")?;
    } else if stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install logger")?;
    }

    Ok(())
}

fn open_repo(path: &Path) -> Result<GitCli> {
    match GitCli::open(path) {
        Ok(git) => Ok(git),
        Err(GitError::NotARepo) => anyhow::bail!(
            "Not in a git repository: {}\n\
             \n\
             Run retype from inside a repository or pass --repo <path>.",
            path.display()
        ),
        Err(err) => Err(err).context("Failed to open git repository"),
    }
}

/// Index of `rev` in the newest-first log: `HEAD`, `HEAD~N` or a hash prefix
fn resolve_start(commits: &[Commit], rev: &str) -> Option<usize> {
    let rev = rev.trim();
    if rev.eq_ignore_ascii_case("head") {
        return (!commits.is_empty()).then_some(0);
    }
    if let Some(back) = rev.strip_prefix("HEAD~") {
        let back = if back.is_empty() { 1 } else { back.parse().ok()? };
        return (back < commits.len()).then_some(back);
    }
    if rev.is_empty() {
        return None;
    }
    let rev = rev.to_ascii_lowercase();
    commits.iter().position(|c| c.id.starts_with(&rev))
}

fn commit_label(commit: &Commit, times: &TimeFormatter, now: i64) -> String {
    format!(
        "{} {} · {}, {}",
        commit.short_id(),
        commit.summary(),
        commit.author,
        times.format(commit.author_time, now)
    )
}

fn load_preferences() -> PreferenceStore {
    let Some(path) = config::preferences_path() else {
        return PreferenceStore::in_memory();
    };
    PreferenceStore::load(&path).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "unreadable preferences, not saving");
        PreferenceStore::in_memory()
    })
}

/// Draw and handle keys until `fut` completes.
///
/// A terminal failure stops the session and waits for its cleanup before the
/// error is returned.
async fn drive<F: Future>(
    terminal: &mut Tui,
    events: &mut EventStream,
    screen: &SharedScreen,
    control: &PlaybackControl,
    theme: &Theme,
    fut: F,
) -> Result<F::Output> {
    let mut fut = pin!(fut);
    let mut render = tokio::time::interval(FRAME);
    render.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut input_open = true;

    let failure = loop {
        tokio::select! {
            output = &mut fut => return Ok(output),
            _ = render.tick() => {
                let drawn = terminal.draw(|frame| ui::draw(frame, &mut screen.borrow_mut(), control, theme));
                if let Err(err) = drawn {
                    break anyhow::Error::new(err).context("Failed to draw");
                }
            }
            event = events.next().fuse(), if input_open => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    input::handle_key(&mut screen.borrow_mut(), control, key);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    break anyhow::Error::new(err).context("Failed to read terminal input");
                }
                None => {
                    // No more input can answer a prompt
                    input_open = false;
                    control.request_stop();
                    screen.borrow_mut().dismiss();
                }
            },
        }
    };

    // Questions raised while winding down are dismissed as they appear
    let dismiss = async {
        loop {
            screen.borrow_mut().dismiss();
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };
    tokio::select! {
        _ = futures::future::join(control.stop_and_wait(), &mut fut) => {}
        _ = dismiss => {}
    }
    Err(failure)
}

async fn run_play(repo: &Path, config: &Config, args: PlayArgs) -> Result<()> {
    let git = open_repo(repo)?;
    let commits = git.log().context("Failed to read commit history")?;
    if commits.is_empty() {
        anyhow::bail!("No commits found in {}", git.root().display());
    }

    let start = match args.from.as_deref() {
        Some(rev) => Some(
            resolve_start(&commits, rev)
                .with_context(|| format!("Unknown revision: {rev}"))?,
        ),
        None => None,
    };

    let theme = config.ui.colors.resolve();
    let times = TimeFormatter::new(&config.ui.time);
    let options = PlaybackOptions {
        speed: Duration::from_millis(args.speed.unwrap_or(config.playback.speed)),
        settle: config.playback.settle(),
        auto_play: args.auto_play || config.playback.auto_play,
        follow_cursor: config.ui.follow_cursor,
        workspace_id: git.root().to_string_lossy().to_string(),
    };
    let preferences = load_preferences();

    tui::install_panic_hook();
    let mut terminal = tui::init_tui().context("Failed to initialize terminal")?;
    let mut events = EventStream::new();
    let screen = Screen::shared();
    let control = PlaybackControl::new();
    let mut prompter = TerminalPrompter::new(screen.clone());

    let result = async {
        let start = match start {
            Some(start) => Some(start),
            None => {
                let now = time_format::now();
                let labels: Vec<String> = commits
                    .iter()
                    .map(|commit| commit_label(commit, &times, now))
                    .collect();
                let pick = prompter.choose("Select a commit to start from", &labels);
                drive(&mut terminal, &mut events, &screen, &control, &theme, pick).await?
            }
        };
        let Some(start) = start else {
            return Ok::<_, anyhow::Error>(None);
        };

        let queue = commits[start..].to_vec();
        tracing::info!(start = %queue[0].short_id(), count = queue.len(), "starting playback");

        let mut engine = PlaybackEngine::new(
            &git,
            TerminalSurface::new(screen.clone()),
            prompter,
            options,
        )
        .with_control(control.clone())
        .with_preferences(preferences);
        let outcome = drive(
            &mut terminal,
            &mut events,
            &screen,
            &control,
            &theme,
            engine.play(queue),
        )
        .await?;
        Ok::<_, anyhow::Error>(Some(outcome?))
    }
    .await;

    tui::restore_tui().context("Failed to restore terminal")?;

    match result? {
        Some(SessionOutcome::Completed) => println!("Playback completed."),
        Some(SessionOutcome::Stopped) => println!("Playback stopped."),
        None => {}
    }
    Ok(())
}

fn run_log(git: &GitCli, config: &Config, limit: Option<usize>, json: bool) -> Result<()> {
    let commits = git.log().context("Failed to read commit history")?;
    let limit = limit.unwrap_or(commits.len());
    let times = TimeFormatter::new(&config.ui.time);
    let now = time_format::now();

    if json {
        let entries: Vec<LogEntry> = commits
            .iter()
            .take(limit)
            .map(|commit| LogEntry {
                id: &commit.id,
                short_id: commit.short_id(),
                author: &commit.author,
                time: times.format(commit.author_time, now),
                summary: commit.summary(),
                body: commit.body(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for commit in commits.iter().take(limit) {
        println!(
            "{}  {}  {}  {}",
            commit.short_id(),
            commit.author,
            times.format(commit.author_time, now),
            commit.summary()
        );
        for line in commit.body().lines() {
            println!("    {line}");
        }
    }
    Ok(())
}

fn run_prefs(git: &GitCli, reset: bool) -> Result<()> {
    let path = config::preferences_path().context("No data directory for preferences")?;
    let mut store = PreferenceStore::load(&path)
        .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
    let workspace = git.root().to_string_lossy().to_string();

    if reset {
        if store.clear(&workspace).context("Failed to save preferences")? {
            println!("Cleared next-commit preference for {workspace}");
        } else {
            println!("No saved preference for {workspace}");
        }
        return Ok(());
    }

    let shown = match store.get(&workspace) {
        Some(NextCommitPreference::Always) => "always",
        Some(NextCommitPreference::Never) => "never",
        None => "unset",
    };
    println!("Next commit: {shown}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commits(ids: &[&str]) -> Vec<Commit> {
        ids.iter()
            .map(|id| Commit {
                id: id.to_string(),
                message: format!("Commit {id}"),
                author: "Ada".to_string(),
                author_time: Some(0),
            })
            .collect()
    }

    #[test]
    fn test_resolve_head_forms() {
        let log = commits(&["c3", "b2", "a1"]);
        assert_eq!(resolve_start(&log, "HEAD"), Some(0));
        assert_eq!(resolve_start(&log, "HEAD~"), Some(1));
        assert_eq!(resolve_start(&log, "HEAD~2"), Some(2));
        assert_eq!(resolve_start(&log, "HEAD~3"), None);
        assert_eq!(resolve_start(&[], "HEAD"), None);
    }

    #[test]
    fn test_resolve_hash_prefix() {
        let log = commits(&["abc123", "abd456", "fff000"]);
        assert_eq!(resolve_start(&log, "abd"), Some(1));
        assert_eq!(resolve_start(&log, "FFF"), Some(2));
        assert_eq!(resolve_start(&log, "123"), None);
        assert_eq!(resolve_start(&log, ""), None);
    }

    #[test]
    fn test_commit_label() {
        let commit = Commit {
            id: "0123456789abcdef".to_string(),
            message: "Fix parser\n\nDetails".to_string(),
            author: "Ada".to_string(),
            author_time: Some(100),
        };
        let label = commit_label(&commit, &TimeFormatter::default(), 100);
        assert_eq!(label, "0123456 Fix parser · Ada, just now");
    }

    #[test]
    fn test_config_warnings_reach_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("retype");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "[playback]\nspeed = \"fast\"").unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
        std::env::remove_var("RETYPE_LOG");

        let log = dir.path().join("retype.log");
        let args = Args::try_parse_from(["retype", "--log-file", log.to_str().unwrap()]).unwrap();
        let config = start(&args).unwrap();

        assert_eq!(config.playback.speed, 50);
        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("failed to parse config"), "{logged}");
    }

    #[test]
    fn test_args_default_to_play() {
        let args = Args::try_parse_from(["retype"]).unwrap();
        assert!(args.command.is_none());

        let args = Args::try_parse_from(["retype", "play", "--from", "HEAD~1", "-s", "10"]).unwrap();
        match args.command {
            Some(Command::Play(play)) => {
                assert_eq!(play.from.as_deref(), Some("HEAD~1"));
                assert_eq!(play.speed, Some(10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
