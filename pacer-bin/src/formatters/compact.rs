use std::fmt::Write;

use anyhow::Result;

use super::StatsFormatter;
use crate::stats::ResponseStats;

/// One line per URL followed by a one-line summary
pub(crate) struct Compact;

impl Compact {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl StatsFormatter for Compact {
    fn format(&self, stats: &ResponseStats) -> Result<String> {
        let mut out = String::new();
        for response in &stats.responses {
            writeln!(out, "{response}")?;
        }
        write!(
            out,
            "\n{} Total, {} OK, {} Failed, {} Errors",
            stats.total, stats.successful, stats.failures, stats.errors
        )?;
        Ok(out)
    }
}
