//! Network and markup side of statrace: the resilient HTTP fetcher and
//! the HTML table extractors that plug into the `statrace-core` trait
//! seams.

pub mod extract;
pub mod fbref;
pub mod fetcher;
pub mod headers;
pub mod schedule;

pub use extract::{ExtractorConfig, TableExtractor};
pub use fetcher::{RetryPolicy, StealthFetcher};
pub use headers::{HeaderProfile, default_profiles};
pub use schedule::{ScheduleConfig, ScheduleExtractor};
