//! Configuration file support for retype
//!
//! Config file location: `~/.config/retype/config.toml` (XDG_CONFIG_HOME)
//!
//! Example config:
//! ```toml
//! [playback]
//! speed = 50
//! settle = 300
//! auto_play = false
//!
//! [ui]
//! follow_cursor = true
//!
//! [ui.time]
//! mode = "relative"   # relative | absolute | custom
//! format = "%Y-%m-%d"
//!
//! [ui.colors]
//! addition = "green"
//! deletion = "red"
//! modification = "yellow"
//! cursor = "#FFFFFF"
//! accent = "cyan"
//! ```

use ratatui::style::Color;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Playback configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Base typing delay per character in milliseconds
    pub speed: u64,
    /// Delay after clearing a line in milliseconds
    pub settle: u64,
    /// Skip the between-files prompt
    pub auto_play: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 50,
            settle: 300,
            auto_play: false,
        }
    }
}

impl PlaybackConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle)
    }
}

/// How commit timestamps are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    #[default]
    Relative,
    Absolute,
    Custom,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub mode: TimeMode,
    /// `time` format description or strftime pattern, for `custom`
    pub format: String,
}

/// Highlight and chrome colors as names or `#RRGGBB`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub addition: String,
    pub deletion: String,
    pub modification: String,
    pub cursor: String,
    pub accent: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            addition: "green".to_string(),
            deletion: "red".to_string(),
            modification: "yellow".to_string(),
            cursor: "white".to_string(),
            accent: "cyan".to_string(),
        }
    }
}

/// Resolved colors, ready for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub addition: Color,
    pub deletion: Color,
    pub modification: Color,
    pub cursor: Color,
    pub accent: Color,
    pub muted: Color,
}

impl ColorConfig {
    pub fn resolve(&self) -> Theme {
        let defaults = ColorConfig::default();
        let pick = |value: &str, fallback: &str| {
            Color::from_str(value)
                .or_else(|_| Color::from_str(fallback))
                .unwrap_or(Color::Reset)
        };
        Theme {
            addition: pick(&self.addition, &defaults.addition),
            deletion: pick(&self.deletion, &defaults.deletion),
            modification: pick(&self.modification, &defaults.modification),
            cursor: pick(&self.cursor, &defaults.cursor),
            accent: pick(&self.accent, &defaults.accent),
            muted: Color::DarkGray,
        }
    }
}

/// UI configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Keep the insertion point in view while typing
    pub follow_cursor: bool,
    pub time: TimeConfig,
    pub colors: ColorConfig,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            follow_cursor: true,
            time: TimeConfig::default(),
            colors: ColorConfig::default(),
        }
    }
}

/// Root configuration
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub ui: UiConfig,
}

impl Config {
    fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("retype").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("retype").join("config.toml"));
        }

        // ~/Library/Application Support on macOS
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("retype").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        paths
    }

    /// Get the first existing config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_paths().into_iter().find(|p| p.exists())
    }

    /// Load config from the first existing path.
    /// Returns the default config if no file exists or it can't be parsed.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| std::fs::read_to_string(&path).ok())
            .map(|content| Self::parse(&content))
            .unwrap_or_default()
    }

    fn parse(content: &str) -> Self {
        toml::from_str(content)
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to parse config, using defaults");
                eprintln!("Warning: Failed to parse config: {}", e);
                e
            })
            .unwrap_or_default()
    }
}

/// Where the next-commit preference is persisted
pub fn preferences_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("retype").join("preferences.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.playback.speed, 50);
        assert_eq!(config.playback.settle(), Duration::from_millis(300));
        assert!(!config.playback.auto_play);
        assert!(config.ui.follow_cursor);
        assert_eq!(config.ui.time.mode, TimeMode::Relative);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [playback]
            speed = 20

            [ui.time]
            mode = "custom"
            format = "%Y"
            "#,
        );
        assert_eq!(config.playback.speed, 20);
        assert_eq!(config.playback.settle, 300);
        assert_eq!(config.ui.time.mode, TimeMode::Custom);
        assert_eq!(config.ui.time.format, "%Y");
        assert!(config.ui.follow_cursor);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let config = Config::parse("[playback]\nspeed = \"fast\"");
        assert_eq!(config.playback.speed, 50);
    }

    #[test]
    fn test_colors_resolve_with_fallback() {
        let colors = ColorConfig {
            addition: "#00ff00".to_string(),
            deletion: "not-a-color".to_string(),
            ..ColorConfig::default()
        };
        let theme = colors.resolve();
        assert_eq!(theme.addition, Color::Rgb(0, 255, 0));
        assert_eq!(theme.deletion, Color::Red);
        assert_eq!(theme.modification, Color::Yellow);
    }
}
