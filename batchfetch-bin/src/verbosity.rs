//! `-v`/`-q` flags controlling how much batchfetch logs.
//!
//! By default only warnings and errors are reported.
//! - `-q` only shows errors
//! - `-qq` silences log output
//! - `-v` shows info (one line per fetched URL)
//! - `-vv` shows debug (every failed attempt and its backoff)
//! - `-vvv` shows trace

use std::fmt;

use log::{Level, LevelFilter};
use serde::Deserialize;

/// Level used when neither `-v` nor `-q` is given
const BASE_LEVEL: Level = Level::Warn;

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// Pass many times for more log output
    ///
    /// By default, only warnings and errors are logged. Passing `-v` one time
    /// also logs every fetched URL, `-vv` enables debug logging (failed
    /// attempts and retries) and `-vvv` trace.
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet",
    )]
    verbose: u8,

    /// Less output per occurrence
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose",
    )]
    quiet: u8,
}

impl Verbosity {
    /// Get the log level filter.
    ///
    /// Passing `-q` often enough turns logging off entirely.
    pub(crate) const fn log_level_filter(&self) -> LevelFilter {
        match self.verbosity() {
            i16::MIN..=-1 => LevelFilter::Off,
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    const fn verbosity(&self) -> i16 {
        level_value(BASE_LEVEL) - (self.quiet as i16) + (self.verbose as i16)
    }
}

// This can be deserialized from a string like "warn", "warning", or "Warning"
// for example
impl<'de> Deserialize<'de> for Verbosity {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = match s.to_lowercase().as_str() {
            "off" => -1,
            "error" => level_value(Level::Error),
            "warn" | "warning" => level_value(Level::Warn),
            "info" => level_value(Level::Info),
            "debug" => level_value(Level::Debug),
            "trace" => level_value(Level::Trace),
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };
        let offset = value - level_value(BASE_LEVEL);
        Ok(Verbosity {
            verbose: offset.max(0) as u8,
            quiet: (-offset).max(0) as u8,
        })
    }
}

const fn level_value(level: Level) -> i16 {
    match level {
        Level::Error => 0,
        Level::Warn => 1,
        Level::Info => 2,
        Level::Debug => 3,
        Level::Trace => 4,
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.log_level_filter())
    }
}
