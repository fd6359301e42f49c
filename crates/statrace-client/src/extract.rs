//! Generic stats-table extraction.
//!
//! Walks every table matching a structural selector, keeps the real data
//! rows of its body, and yields one [`RawRecord`] per row. Everything
//! source-specific (which selector marks a stats table, which fields are
//! text, how a cell's text is normalized) comes in through
//! [`ExtractorConfig`], so the walking and coercion logic stays generic.
//!
//! Extraction never fails outright: a malformed row or table is logged
//! with enough context to debug and skipped. Partial yield beats total
//! failure when a single row of markup goes bad.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use statrace_core::error::Error;
use statrace_core::record::RawRecord;
use statrace_core::traits::StatsParser;

/// Cell text handed to a normalizer: the whole cell plus the first
/// anchor's text, when the cell contains one.
#[derive(Debug, Clone)]
pub struct CellText {
    pub full: String,
    pub anchor: Option<String>,
}

/// Per-field text normalization supplied by the caller.
pub type CellNormalizer = Arc<dyn Fn(&CellText) -> String + Send + Sync>;

/// Prefer the anchor text over the raw cell text, dropping leading
/// whitespace (substitute markers and non-breaking indents).
pub fn anchor_text() -> CellNormalizer {
    Arc::new(|cell: &CellText| {
        cell.anchor
            .as_deref()
            .unwrap_or(cell.full.as_str())
            .trim_start()
            .to_string()
    })
}

/// Keep only the last whitespace-delimited token, e.g. `"br BRA"` → `"BRA"`.
pub fn last_token() -> CellNormalizer {
    Arc::new(|cell: &CellText| {
        let text = cell.anchor.as_deref().unwrap_or(cell.full.as_str()).trim();
        text.split_whitespace()
            .next_back()
            .unwrap_or(text)
            .to_string()
    })
}

/// Source-specific extraction settings.
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Structural selector locating candidate tables.
    pub table_selector: String,

    /// Attribute carrying a cell's field name.
    pub stat_attr: String,

    /// Class marking a visually-suppressed zero cell.
    pub zero_class: String,

    /// Row classes that mark spacers and repeated in-body headers.
    pub skip_row_classes: Vec<String>,

    /// Fields that stay text even when their value parses as a number.
    pub categorical: HashSet<String>,

    /// Per-field text normalization.
    pub normalizers: HashMap<String, CellNormalizer>,
}

impl ExtractorConfig {
    pub fn new(table_selector: impl Into<String>) -> Self {
        Self {
            table_selector: table_selector.into(),
            stat_attr: "data-stat".to_string(),
            zero_class: "iz".to_string(),
            skip_row_classes: vec![
                "spacer".to_string(),
                "thead".to_string(),
                "partial_table_thead".to_string(),
            ],
            categorical: HashSet::new(),
            normalizers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_categorical<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, field: impl Into<String>, normalizer: CellNormalizer) -> Self {
        self.normalizers.insert(field.into(), normalizer);
        self
    }
}

/// Extracts records from every matching table in a page.
#[derive(Clone)]
pub struct TableExtractor {
    table_selector: Selector,
    cell_selector: Selector,
    anchor_selector: Selector,
    config: ExtractorConfig,
}

impl TableExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, Error> {
        let table_selector = parse_selector(&config.table_selector)?;
        let cell_selector = parse_selector(&format!(
            "th[{attr}], td[{attr}]",
            attr = config.stat_attr
        ))?;
        let anchor_selector = parse_selector("a")?;

        Ok(Self {
            table_selector,
            cell_selector,
            anchor_selector,
            config,
        })
    }

    /// Extract one record per retained data row, across all matching
    /// tables. Zero matching tables is a valid, empty outcome.
    pub fn extract(&self, html: &str) -> Vec<RawRecord> {
        let document = Html::parse_document(html);
        let tables: Vec<ElementRef<'_>> = document.select(&self.table_selector).collect();

        if tables.is_empty() {
            tracing::debug!(
                selector = %self.config.table_selector,
                "No matching tables on page"
            );
            return Vec::new();
        }

        let mut records = Vec::new();
        for table in tables {
            let Some(table_id) = table.value().attr("id") else {
                tracing::warn!(
                    snippet = %snippet(&table.html(), 500),
                    "Table without id, skipping"
                );
                continue;
            };

            let Some(rows) = direct_body_rows(table) else {
                tracing::warn!(table_id, "Table has no tbody, skipping");
                continue;
            };

            let mut kept = 0usize;
            for row in rows {
                if self.should_skip_row(row) {
                    continue;
                }
                if let Some(record) = self.extract_row(row) {
                    kept += 1;
                    records.push(record);
                }
            }
            tracing::debug!(table_id, rows = kept, "Table processed");
        }

        tracing::debug!(records = records.len(), "Extraction complete");
        records
    }

    fn should_skip_row(&self, row: ElementRef<'_>) -> bool {
        if has_any_class(row, &self.config.skip_row_classes) {
            return true;
        }
        // Rows made of header-style cells only are repeated headers.
        let cells: Vec<ElementRef<'_>> = row.children().filter_map(ElementRef::wrap).collect();
        cells.is_empty() || cells.iter().all(|c| c.value().name() == "th")
    }

    /// One record per row; `None` when the row carries no field cells.
    fn extract_row(&self, row: ElementRef<'_>) -> Option<RawRecord> {
        let mut record = RawRecord::new();

        for cell in row.select(&self.cell_selector) {
            let Some(field) = cell.value().attr(&self.config.stat_attr) else {
                continue;
            };

            let text = CellText {
                full: cell.text().collect::<String>().trim().to_string(),
                anchor: cell
                    .select(&self.anchor_selector)
                    .next()
                    .map(|a| a.text().collect::<String>().trim().to_string()),
            };
            let value = match self.config.normalizers.get(field) {
                Some(normalize) => normalize(&text),
                None => text.full.clone(),
            };

            let visually_zero = cell
                .value()
                .classes()
                .any(|c| c == self.config.zero_class);

            if visually_zero && value.is_empty() {
                record.insert(field, 0.0);
            } else if !value.is_empty() && !self.config.categorical.contains(field) {
                match value.parse::<f64>() {
                    Ok(number) => record.insert(field, number),
                    Err(_) => record.insert(field, value),
                }
            } else {
                record.insert(field, value);
            }
        }

        (!record.is_empty()).then_some(record)
    }
}

impl StatsParser for TableExtractor {
    fn parse_records(&self, html: &str) -> Vec<RawRecord> {
        self.extract(html)
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, Error> {
    Selector::parse(selector).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Direct `<tr>` children of the table's first `<tbody>`; `None` when the
/// table has no body section.
pub(crate) fn direct_body_rows(table: ElementRef<'_>) -> Option<Vec<ElementRef<'_>>> {
    let tbody = table
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tbody")?;
    Some(
        tbody
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "tr")
            .collect(),
    )
}

pub(crate) fn has_any_class(el: ElementRef<'_>, classes: &[String]) -> bool {
    el.value()
        .classes()
        .any(|c| classes.iter().any(|skip| skip == c))
}

pub(crate) fn snippet(html: &str, limit: usize) -> String {
    if html.len() <= limit {
        html.to_string()
    } else {
        let mut end = limit;
        while !html.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &html[..end])
    }
}
