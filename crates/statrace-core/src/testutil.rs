//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls.

use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::record::{RawRecord, RoundRef};
use crate::traits::{Fetcher, ScheduleParser, StatsParser};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that pops queued responses and records requested URLs.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, Error>>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: Error) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, Error>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs fetched so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockScheduleParser
// ---------------------------------------------------------------------------

/// Mock schedule parser returning a fixed round list.
#[derive(Clone)]
pub struct MockScheduleParser {
    rounds: Arc<Vec<RoundRef>>,
}

impl MockScheduleParser {
    pub fn new(rounds: Vec<RoundRef>) -> Self {
        Self {
            rounds: Arc::new(rounds),
        }
    }
}

impl ScheduleParser for MockScheduleParser {
    fn parse_rounds(&self, _html: &str, _page_url: &str) -> Vec<RoundRef> {
        self.rounds.as_ref().clone()
    }
}

// ---------------------------------------------------------------------------
// MockStatsParser
// ---------------------------------------------------------------------------

/// Mock stats parser that pops one queued record batch per call.
/// An exhausted queue yields empty batches.
#[derive(Clone)]
pub struct MockStatsParser {
    batches: Arc<Mutex<Vec<Vec<RawRecord>>>>,
}

impl MockStatsParser {
    pub fn new(batches: Vec<Vec<RawRecord>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches)),
        }
    }
}

impl StatsParser for MockStatsParser {
    fn parse_records(&self, _html: &str) -> Vec<RawRecord> {
        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            Vec::new()
        } else {
            batches.remove(0)
        }
    }
}
