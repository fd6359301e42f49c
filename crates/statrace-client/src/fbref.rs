//! Extraction profile for fbref-style markup.
//!
//! Everything brittle about one particular upstream lives here: which
//! selector marks a stats table, which fields are intentionally textual,
//! and how their cells are normalized. The extractors themselves stay
//! source-agnostic.

use statrace_core::error::Error;

use crate::extract::{ExtractorConfig, TableExtractor, anchor_text, last_token};
use crate::schedule::{ScheduleConfig, ScheduleExtractor};

/// Per-match summary tables ("stats_abc123_summary" and friends).
pub const STATS_TABLE_SELECTOR: &str = "table.stats_table[id*='summary']";

/// Season schedule tables ("sched_2025_9_1" and friends).
pub const SCHEDULE_TABLE_SELECTOR: &str = "table.stats_table[id*='sched']";

/// Extractor for per-match player summary tables.
pub fn stats_extractor() -> Result<TableExtractor, Error> {
    let config = ExtractorConfig::new(STATS_TABLE_SELECTOR)
        .with_categorical(["player", "nationality", "position"])
        // Player cells wrap the name in a link, with leading whitespace
        // marking substitutes.
        .with_normalizer("player", anchor_text())
        // Nationality cells read "br BRA"; only the code matters.
        .with_normalizer("nationality", last_token());
    TableExtractor::new(config)
}

/// Extractor for season schedule tables.
pub fn schedule_extractor() -> Result<ScheduleExtractor, Error> {
    ScheduleExtractor::new(ScheduleConfig::new(SCHEDULE_TABLE_SELECTOR))
}
