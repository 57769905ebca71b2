//! Rendering of the final [`ResponseStats`]
mod compact;
mod json;

pub(crate) use compact::Compact;
pub(crate) use json::Json;

use anyhow::Result;

use crate::{options::StatsFormat, stats::ResponseStats};

pub(crate) trait StatsFormatter {
    /// Format the responses and the summary of a run
    fn format(&self, stats: &ResponseStats) -> Result<String>;
}

/// Create a stats formatter based on the given format option
pub(crate) fn get_stats_formatter(format: StatsFormat) -> Box<dyn StatsFormatter> {
    match format {
        StatsFormat::Compact => Box::new(Compact::new()),
        StatsFormat::Json => Box::new(Json::new()),
    }
}
