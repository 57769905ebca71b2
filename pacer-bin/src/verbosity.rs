//! `-v`/`-q` flags controlling how much pacer logs.
//!
//! By default only warnings and errors are reported.
//! - `-q` only shows errors, `-qq` silences logging
//! - `-v` shows info
//! - `-vv` shows debug
//! - `-vvv` shows trace

use std::fmt;

use log::LevelFilter;
use serde::Deserialize;

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// Pass many times for more log output
    ///
    /// By default, only warnings and errors are reported. Passing `-v` one
    /// time also prints info, `-vv` enables debug logging and `-vvv` trace.
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
    /// Quieting below `error` turns logging off.
    pub(crate) const fn log_level_filter(&self) -> LevelFilter {
        level_filter(self.verbosity())
    }

    const fn verbosity(&self) -> i8 {
        level_value(LevelFilter::Warn)
            .saturating_sub(clamp_count(self.quiet))
            .saturating_add(clamp_count(self.verbose))
    }
}

/// Flag counts above `i8::MAX` change nothing further
#[allow(clippy::cast_possible_wrap)]
const fn clamp_count(count: u8) -> i8 {
    if count > i8::MAX as u8 {
        i8::MAX
    } else {
        count as i8
    }
}

// Deserialized from a level name like "info", "warning" or "Debug"
impl<'de> Deserialize<'de> for Verbosity {
    #[allow(clippy::cast_sign_loss)]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let level = match s.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };

        let offset = level_value(level) - level_value(LevelFilter::Warn);
        Ok(Verbosity {
            verbose: offset.max(0) as u8,
            quiet: (-offset).max(0) as u8,
        })
    }
}

const fn level_value(level: LevelFilter) -> i8 {
    match level {
        LevelFilter::Off => -1,
        LevelFilter::Error => 0,
        LevelFilter::Warn => 1,
        LevelFilter::Info => 2,
        LevelFilter::Debug => 3,
        LevelFilter::Trace => 4,
    }
}

const fn level_filter(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=-1 => LevelFilter::Off,
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.log_level_filter())
    }
}
