//! Commit timestamp rendering for the picker and `retype log`

use crate::config::{TimeConfig, TimeMode};
use time::format_description::{parse_owned, parse_strftime_owned, OwnedFormatItem};
use time::OffsetDateTime;

const ABSOLUTE_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]";
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone)]
enum Style {
    Relative,
    Formatted(OwnedFormatItem),
}

#[derive(Debug, Clone)]
pub struct TimeFormatter {
    style: Style,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::new(&TimeConfig::default())
    }
}

impl TimeFormatter {
    pub fn new(config: &TimeConfig) -> Self {
        let style = match config.mode {
            TimeMode::Relative => Style::Relative,
            TimeMode::Absolute => absolute(),
            TimeMode::Custom => custom(&config.format).map(Style::Formatted).unwrap_or_else(|| {
                tracing::warn!(format = %config.format, "invalid time format, using absolute");
                absolute()
            }),
        };
        Self { style }
    }

    /// Render a unix timestamp relative to `now`
    pub fn format(&self, epoch: Option<i64>, now: i64) -> String {
        let Some(epoch) = epoch else {
            return UNKNOWN.to_string();
        };
        match &self.style {
            Style::Relative => relative_age(now.saturating_sub(epoch)),
            Style::Formatted(format) => OffsetDateTime::from_unix_timestamp(epoch)
                .ok()
                .and_then(|dt| dt.format(format).ok())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn absolute() -> Style {
    parse_owned::<2>(ABSOLUTE_FORMAT)
        .map(Style::Formatted)
        .unwrap_or(Style::Relative)
}

fn custom(format: &str) -> Option<OwnedFormatItem> {
    let format = format.trim();
    if format.is_empty() {
        None
    } else if format.contains('%') {
        parse_strftime_owned(format).ok()
    } else {
        parse_owned::<2>(format).ok()
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

/// Coarse age of a commit, finest unit first
pub fn relative_age(age_secs: i64) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    match age_secs {
        s if s < MINUTE => "just now".to_string(),
        s if s < HOUR => plural(s / MINUTE, "minute"),
        s if s < DAY => plural(s / HOUR, "hour"),
        s if s < 30 * DAY => plural(s / DAY, "day"),
        s if s < 365 * DAY => plural(s / (30 * DAY), "month"),
        s => plural(s / (365 * DAY), "year"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_age() {
        assert_eq!(relative_age(-5), "just now");
        assert_eq!(relative_age(59), "just now");
        assert_eq!(relative_age(60), "1 minute ago");
        assert_eq!(relative_age(3 * 3600 + 5), "3 hours ago");
        assert_eq!(relative_age(86_400), "1 day ago");
        assert_eq!(relative_age(45 * 86_400), "1 month ago");
        assert_eq!(relative_age(800 * 86_400), "2 years ago");
    }

    #[test]
    fn test_absolute_mode() {
        let formatter = TimeFormatter::new(&TimeConfig {
            mode: TimeMode::Absolute,
            format: String::new(),
        });
        assert_eq!(formatter.format(Some(0), 0), "1970-01-01 00:00");
        assert_eq!(formatter.format(None, 0), "unknown");
    }

    #[test]
    fn test_custom_strftime() {
        let formatter = TimeFormatter::new(&TimeConfig {
            mode: TimeMode::Custom,
            format: "%Y/%m".to_string(),
        });
        assert_eq!(formatter.format(Some(1_700_000_000), 0), "2023/11");
    }

    #[test]
    fn test_invalid_custom_falls_back_to_absolute() {
        let formatter = TimeFormatter::new(&TimeConfig {
            mode: TimeMode::Custom,
            format: "   ".to_string(),
        });
        assert_eq!(formatter.format(Some(0), 0), "1970-01-01 00:00");
    }
}
