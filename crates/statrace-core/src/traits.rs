use std::future::Future;

use crate::error::Error;
use crate::record::{RawRecord, RoundRef};

/// Fetches raw page content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, Error>> + Send;
}

/// Turns a stats page into records, one per retained table row.
///
/// Implementations never fail on malformed rows or tables: partial yield
/// beats no yield, so problems are logged and skipped.
pub trait StatsParser: Send + Sync + Clone {
    fn parse_records(&self, html: &str) -> Vec<RawRecord>;
}

/// Turns a season schedule page into round references.
///
/// `page_url` is the URL the markup was fetched from, used to resolve
/// relative links. Zero rounds is a valid outcome.
pub trait ScheduleParser: Send + Sync + Clone {
    fn parse_rounds(&self, html: &str, page_url: &str) -> Vec<RoundRef>;
}
