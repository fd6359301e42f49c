//! Season-schedule extraction: which rounds exist and where their stats
//! pages live.
//!
//! Shares the table-walking rules with [`crate::extract`]: only direct body
//! rows count, spacer and repeated-header rows are skipped, and a bad row
//! never aborts the page.

use scraper::{ElementRef, Html, Selector};
use statrace_core::error::Error;
use statrace_core::record::RoundRef;
use statrace_core::traits::ScheduleParser;
use url::Url;

use crate::extract::{direct_body_rows, has_any_class, parse_selector, snippet};

/// Source-specific schedule settings.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Structural selector locating schedule tables.
    pub table_selector: String,

    /// Attribute carrying a cell's field name.
    pub stat_attr: String,

    /// Field holding the round number.
    pub round_field: String,

    /// Field holding the date label.
    pub date_field: String,

    /// Field whose anchor links to the round's stats page.
    pub link_field: String,

    /// Row classes that mark spacers and repeated in-body headers.
    pub skip_row_classes: Vec<String>,
}

impl ScheduleConfig {
    pub fn new(table_selector: impl Into<String>) -> Self {
        Self {
            table_selector: table_selector.into(),
            stat_attr: "data-stat".to_string(),
            round_field: "gameweek".to_string(),
            date_field: "date".to_string(),
            link_field: "match_report".to_string(),
            skip_row_classes: vec![
                "spacer".to_string(),
                "thead".to_string(),
                "partial_table_thead".to_string(),
            ],
        }
    }
}

/// Extracts [`RoundRef`] rows from schedule tables.
#[derive(Clone)]
pub struct ScheduleExtractor {
    table_selector: Selector,
    round_selector: Selector,
    date_selector: Selector,
    link_selector: Selector,
    config: ScheduleConfig,
}

impl ScheduleExtractor {
    pub fn new(config: ScheduleConfig) -> Result<Self, Error> {
        let attr = &config.stat_attr;
        Ok(Self {
            table_selector: parse_selector(&config.table_selector)?,
            round_selector: parse_selector(&format!(
                "th[{attr}='{field}'], td[{attr}='{field}']",
                field = config.round_field
            ))?,
            date_selector: parse_selector(&format!(
                "th[{attr}='{field}'], td[{attr}='{field}']",
                field = config.date_field
            ))?,
            link_selector: parse_selector(&format!(
                "th[{attr}='{field}'] a, td[{attr}='{field}'] a",
                field = config.link_field
            ))?,
            config,
        })
    }

    /// Extract every round row of every matching schedule table. Rows
    /// without a parsable round number are logged and skipped; rows
    /// without a stats link are kept with `url: None`.
    pub fn extract(&self, html: &str, page_url: &str) -> Vec<RoundRef> {
        let document = Html::parse_document(html);
        let tables: Vec<ElementRef<'_>> = document.select(&self.table_selector).collect();

        if tables.is_empty() {
            tracing::debug!(
                selector = %self.config.table_selector,
                "No schedule tables on page"
            );
            return Vec::new();
        }

        let base = Url::parse(page_url).ok();
        let mut rounds = Vec::new();

        for table in tables {
            let table_id = table.value().attr("id").unwrap_or("<missing>");

            let Some(rows) = direct_body_rows(table) else {
                tracing::warn!(table_id, "Schedule table has no tbody, skipping");
                continue;
            };

            for row in rows {
                if self.should_skip_row(row) {
                    continue;
                }
                if let Some(round) = self.extract_row(row, base.as_ref(), table_id) {
                    rounds.push(round);
                }
            }
        }

        tracing::debug!(rounds = rounds.len(), "Schedule extraction complete");
        rounds
    }

    fn should_skip_row(&self, row: ElementRef<'_>) -> bool {
        if has_any_class(row, &self.config.skip_row_classes) {
            return true;
        }
        let cells: Vec<ElementRef<'_>> = row.children().filter_map(ElementRef::wrap).collect();
        cells.is_empty() || cells.iter().all(|c| c.value().name() == "th")
    }

    fn extract_row(
        &self,
        row: ElementRef<'_>,
        base: Option<&Url>,
        table_id: &str,
    ) -> Option<RoundRef> {
        let round_cell = row.select(&self.round_selector).next()?;
        let date_cell = row.select(&self.date_selector).next()?;

        let round_text = round_cell.text().collect::<String>().trim().to_string();
        let round = match round_text.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    table_id,
                    round = %round_text,
                    snippet = %snippet(&row.html(), 200),
                    "Unparsable round number, skipping row"
                );
                return None;
            }
        };

        let url = row
            .select(&self.link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve(base, href));

        Some(RoundRef {
            round,
            date: date_cell.text().collect::<String>().trim().to_string(),
            url,
        })
    }
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(Url::into),
        None => Url::parse(href).ok().map(Url::into),
    }
}

impl ScheduleParser for ScheduleExtractor {
    fn parse_rounds(&self, html: &str, page_url: &str) -> Vec<RoundRef> {
        self.extract(html, page_url)
    }
}
