//! Runtime verbosity levels.
//!
//! The runtime emits `tracing` events; a front end installs the subscriber
//! and picks its level through [`LogLevel`]. Levels are ordered from least
//! to most verbose and numeric input outside the known range clamps.

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

/// Environment variable holding the requested level.
pub const LOG_LEVEL_ENV: &str = "ED247_LOG_LEVEL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error = 0,
    #[default]
    Warning = 1,
    Info = 2,
    Debug = 3,
    /// Every frame and sample.
    Test = 4,
}

impl LogLevel {
    /// Map a numeric level, clamping out-of-range values.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            i64::MIN..=0 => Self::Error,
            1 => Self::Warning,
            2 => Self::Info,
            3 => Self::Debug,
            _ => Self::Test,
        }
    }

    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Test => LevelFilter::TRACE,
        }
    }

    /// Level from [`LOG_LEVEL_ENV`], if set and parseable.
    pub fn from_env() -> Option<Self> {
        std::env::var(LOG_LEVEL_ENV).ok()?.parse().ok()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Test => "test",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected error, warning, info, debug, test or a number)")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<i64>() {
            return Ok(Self::from_raw(raw));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "test" | "trace" | "crazy" => Ok(Self::Test),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels_clamp() {
        assert_eq!(LogLevel::from_raw(-7), LogLevel::Error);
        assert_eq!(LogLevel::from_raw(2), LogLevel::Info);
        assert_eq!(LogLevel::from_raw(99), LogLevel::Test);
        assert_eq!("1000".parse::<LogLevel>().unwrap(), LogLevel::Test);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Test);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn ordering_matches_verbosity() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Debug < LogLevel::Test);
        assert!(LogLevel::Info.as_filter() < LogLevel::Debug.as_filter());
    }

    #[test]
    fn default_is_warning() {
        assert_eq!(LogLevel::default(), LogLevel::Warning);
    }
}
