//! `pacer` is a library for sending calls to an external service with a
//! concurrency ceiling and a pacing requirement.
//!
//! The main struct of this crate is [`Dispatcher`]. It runs a fixed number of
//! workers (how many calls may run at once) behind a shared admission gate
//! (how often a new call may start), and shuts down gracefully: once
//! shutdown begins, new requests are rejected while admitted work drains.
//!
//! Anything implementing [`Execute`] can be dispatched; `reqwest::Client`
//! works out of the box:
//!
//! ```no_run
//! use std::time::Duration;
//! use pacer_lib::DispatcherBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let client = reqwest::Client::new();
//!   let dispatcher = DispatcherBuilder::builder()
//!       .workers(4)
//!       .interval(Duration::from_millis(100))
//!       .build()
//!       .dispatcher(client.clone())?;
//!
//!   let requests = ["https://example.com", "https://example.org"]
//!       .into_iter()
//!       .map(|url| client.get(url).build())
//!       .collect::<Result<Vec<_>, _>>()?;
//!
//!   for response in dispatcher.call_batch(requests).await? {
//!       println!("{}", response?.status());
//!   }
//!   dispatcher.shutdown().await;
//!   Ok(())
//! }
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
#![warn(missing_docs)]

mod dispatcher;
mod executor;
mod gate;
mod lifecycle;
mod types;

pub mod pool;

#[cfg(test)]
mod test_utils;

pub use crate::{
    dispatcher::{DEFAULT_WORKERS, Dispatcher, DispatcherBuilder},
    executor::{BlockingError, BlockingExecutor, Execute},
    gate::{AdmissionGate, GateClosed},
    pool::{CallTask, WorkerPool},
    types::{BuildError, ErrorKind, Outcome, State},
};
