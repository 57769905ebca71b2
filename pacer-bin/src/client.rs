use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method};

use crate::options::Config;

/// Creates an HTTP client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<Client> {
    let timeout = Duration::from_secs(cfg.timeout as u64);

    Client::builder()
        .timeout(timeout)
        .user_agent(&cfg.user_agent)
        .build()
        .context("Failed to create HTTP client")
}

/// Parse the configured request method, case-insensitively
pub(crate) fn method(cfg: &Config) -> Result<Method> {
    Method::from_str(&cfg.method.to_uppercase())
        .with_context(|| format!("Invalid request method `{}`", cfg.method))
}
