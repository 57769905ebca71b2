use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::{fs, fs::File, time::Duration};

use anyhow::{Context, Result, bail};
use clap::builder::PossibleValuesParser;
use clap::{Parser, builder::TypedValueParser};
use const_format::{concatcp, formatcp};
use pacer_lib::DEFAULT_WORKERS;
use serde::Deserialize;
use strum::{Display, EnumString, VariantNames};

use crate::verbosity::Verbosity;

pub(crate) const PACER_CONFIG_FILE: &str = "pacer.toml";

/// Lines starting with this marker are ignored in URL input files
const COMMENT_MARKER: &str = "#";

/// Reads URLs from standard input when given as the only input
const STDIN_INPUT: &str = "-";

pub(crate) const DEFAULT_TIMEOUT_SECS: usize = 20;
pub(crate) const DEFAULT_USER_AGENT: &str = concatcp!("pacer/", env!("CARGO_PKG_VERSION"));
const DEFAULT_METHOD: &str = "GET";
const DEFAULT_MAX_CONCURRENCY: usize = DEFAULT_WORKERS;

// clap requires `&str` defaults whereas serde expects owned values
const MAX_CONCURRENCY_STR: &str = concatcp!(DEFAULT_MAX_CONCURRENCY);
const TIMEOUT_STR: &str = concatcp!(DEFAULT_TIMEOUT_SECS);
// Show the default config file while still telling apart an explicit one,
// which must exist, from the implicit one, which may be missing
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    PACER_CONFIG_FILE,
);

/// Format of the summary printed after all requests finished
#[derive(Debug, Deserialize, Default, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StatsFormat {
    /// One line per URL followed by a one-line summary
    #[default]
    Compact,
    /// A single JSON document with the per-URL results and the summary
    Json,
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

default_function! {
    max_concurrency: usize = DEFAULT_MAX_CONCURRENCY;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    timeout: usize = DEFAULT_TIMEOUT_SECS;
    method: String = DEFAULT_METHOD.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Copy every key which the CLI left at its default from the config file.
// The unused struct literal makes the compiler reject a key list which
// doesn't cover every field of `Config`.
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// pacer sends one HTTP request per URL while keeping at most
/// `--max-concurrency` requests in flight and starting at most one request
/// per `--interval`.
///
/// Results are printed in input order, followed by a summary.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct PacerOptions {
    /// URLs to request. Use `-` to read them from standard input.
    #[arg(name = "urls")]
    raw_inputs: Vec<String>,

    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl PacerOptions {
    /// Collect all URLs to request, in the order they were given.
    ///
    /// Positional URLs come first, followed by the contents of
    /// `--input-file`.
    pub(crate) fn urls(&self) -> Result<Vec<String>> {
        let mut urls = if self.raw_inputs == [STDIN_INPUT] {
            read_lines(io::stdin().lock()).context("Cannot read URLs from stdin")?
        } else {
            self.raw_inputs.clone()
        };

        if let Some(path) = &self.config.input_file {
            let file = File::open(path)
                .with_context(|| format!("Cannot open input file `{}`", path.display()))?;
            urls.extend(
                read_lines(BufReader::new(file))
                    .with_context(|| format!("Cannot read input file `{}`", path.display()))?,
            );
        }

        if urls.is_empty() {
            bail!("No URLs given. Pass them as arguments, with `--input-file` or via stdin (`-`)");
        }
        Ok(urls)
    }
}

/// Read lines, skipping blank lines and comments
fn read_lines(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with(COMMENT_MARKER) {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// The main configuration for pacer
#[derive(Parser, Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Read URLs from the given file, one per line.
    /// Blank lines and lines starting with `#` are ignored.
    #[arg(long, value_name = "PATH", verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) input_file: Option<PathBuf>,

    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Maximum number of requests in flight at the same time
    #[arg(long, default_value = &MAX_CONCURRENCY_STR)]
    #[serde(default = "max_concurrency")]
    pub(crate) max_concurrency: usize,

    /// Minimum time between the start of two consecutive requests
    ///
    /// Without it, requests start as soon as a worker is free.
    ///
    /// Examples:
    ///   --interval 50ms
    ///   --interval 1s
    #[arg(long, value_parser = humantime::parse_duration, verbatim_doc_comment)]
    #[serde(default, with = "humantime_serde")]
    pub(crate) interval: Option<Duration>,

    /// Number of threads to utilize.
    /// Defaults to number of cores available to the system
    #[arg(short = 'T', long)]
    #[serde(default)]
    pub(crate) threads: Option<usize>,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Request timeout in seconds from connect to response finished
    #[arg(short, long, default_value = &TIMEOUT_STR)]
    #[serde(default = "timeout")]
    pub(crate) timeout: usize,

    /// Request method
    // Using `-X` as a short param similar to curl
    #[arg(short = 'X', long, default_value = DEFAULT_METHOD)]
    #[serde(default = "method")]
    pub(crate) method: String,

    /// Output format of the summary
    #[arg(short, long, default_value = "compact", value_parser = PossibleValuesParser::new(StatsFormat::VARIANTS).map(|s| s.parse::<StatsFormat>().unwrap_or_default()))]
    #[serde(default)]
    pub(crate) format: StatsFormat,
}

impl Config {
    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        fold_in! {
            self, toml;

            Config {
                input_file: None,
                verbose: Verbosity::default(),
                max_concurrency: DEFAULT_MAX_CONCURRENCY,
                interval: None,
                threads: None,
                user_agent: DEFAULT_USER_AGENT,
                timeout: DEFAULT_TIMEOUT_SECS,
                method: DEFAULT_METHOD,
                format: StatsFormat::default(),
            }
        }
    }

    /// Reject values which parse fine but can never work
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            bail!("`max_concurrency` must be at least 1");
        }
        if self.threads == Some(0) {
            bail!("`threads` must be at least 1");
        }
        Ok(())
    }
}
