//! `pacer` sends HTTP requests with a concurrency ceiling and a fixed pace.
//!
//! The pacer binary is a wrapper around pacer-lib: every URL becomes one
//! request, and all requests go through a single dispatcher which keeps at
//! most `--max-concurrency` of them in flight and starts at most one per
//! `--interval`.
//!
//! Request two URLs, at most one every 500 milliseconds:
//! ```sh
//! pacer --interval 500ms https://example.com https://example.org
//! ```
//!
//! Read URLs from a file and send four at a time:
//! ```sh
//! pacer --max-concurrency 4 --input-file urls.txt
//! ```
//!
//! Read URLs from standard input and print a JSON report:
//! ```sh
//! cat urls.txt | pacer --format json -
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Context, Error, Result, bail};
use clap::Parser;
use log::{error, info};
use pacer_lib::DispatcherBuilder;

mod client;
mod formatters;
mod logging;
mod options;
mod response;
mod send;
mod stats;
mod verbosity;

use crate::{
    formatters::get_stats_formatter,
    logging::init_logging,
    options::{Config, PACER_CONFIG_FILE, PacerOptions},
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    RequestFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
///
/// On error, `opts` keeps whatever was merged so far.
fn load_config(opts: &mut PacerOptions) -> Result<()> {
    // An explicitly given config file must exist, the default one may be missing
    let config_file = match &opts.config_file {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(PACER_CONFIG_FILE)).filter(|path| path.is_file()),
    };

    if let Some(config_file) = config_file {
        match Config::load_from_file(&config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    }

    opts.config.validate()
}

/// Set up runtime and call pacer entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let mut opts = PacerOptions::parse();
    let loaded = load_config(&mut opts);

    // After the merge, so that `verbose` from the config file applies too
    init_logging(&opts.config.verbose);

    if let Err(e) = loaded {
        error!("Error while loading config: {e}");
        exit(ExitCode::ConfigFile as i32);
    }

    let runtime = match opts.config.threads {
        Some(threads) => {
            // We define our own runtime instead of the `tokio::main` attribute
            // since we want to make the number of threads configurable
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .enable_all()
                .build()?
        }
        None => tokio::runtime::Runtime::new()?,
    };

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Run pacer on the given URLs
async fn run(opts: &PacerOptions) -> Result<i32> {
    let urls = opts.urls()?;

    let client = client::create(&opts.config)?;
    let method = client::method(&opts.config)?;

    let dispatcher = DispatcherBuilder::builder()
        .workers(opts.config.max_concurrency)
        .interval(opts.config.interval)
        .build()
        .dispatcher(client.clone())?;
    info!(
        "Sending {} request(s) with {} worker(s)",
        urls.len(),
        dispatcher.workers()
    );

    let stats = send::send(&dispatcher, &client, &method, urls).await;
    dispatcher.shutdown().await;
    let stats = stats?;

    let formatted = get_stats_formatter(opts.config.format).format(&stats)?;
    writeln!(io::stdout(), "{formatted}").context("Cannot write results")?;

    let exit_code = if stats.is_success() {
        ExitCode::Success
    } else {
        ExitCode::RequestFailure
    };
    Ok(exit_code as i32)
}
