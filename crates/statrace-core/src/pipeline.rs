//! Harvest orchestration: schedule page → per-round stats pages → batches.
//!
//! Generic over all external dependencies via traits, enabling dependency
//! injection and testability without real HTTP. Every network operation
//! goes through the shared [`RateLimiter`], and the slot is released on
//! failure too.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::limiter::RateLimiter;
use crate::record::PeriodBatch;
use crate::traits::{Fetcher, ScheduleParser, StatsParser};

/// Fetches one source's season worth of records, one batch per round.
pub struct HarvestService<F, S, P>
where
    F: Fetcher,
    S: ScheduleParser,
    P: StatsParser,
{
    fetcher: F,
    schedule: S,
    stats: P,
    limiter: Arc<RateLimiter>,
}

impl<F, S, P> HarvestService<F, S, P>
where
    F: Fetcher,
    S: ScheduleParser,
    P: StatsParser,
{
    pub fn new(fetcher: F, schedule: S, stats: P, limiter: Arc<RateLimiter>) -> Self {
        Self {
            fetcher,
            schedule,
            stats,
            limiter,
        }
    }

    /// Harvest a whole season for one source.
    ///
    /// Fetch errors propagate: one page either yields fully or the harvest
    /// of this source fails. Callers running several sources decide
    /// whether a failed source aborts the others. Cancellation is observed
    /// at every scheduler suspension point.
    pub async fn harvest(
        &self,
        source: &str,
        season_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PeriodBatch>, Error> {
        tracing::info!(%source, url = %season_url, "Fetching season schedule");
        let html = self.paced_fetch(season_url, cancel).await?;
        let rounds = self.schedule.parse_rounds(&html, season_url);

        if rounds.is_empty() {
            tracing::warn!(%source, "No schedule rows found");
            return Ok(Vec::new());
        }
        tracing::info!(%source, rounds = rounds.len(), "Schedule parsed");

        let mut batches: BTreeMap<u32, PeriodBatch> = BTreeMap::new();
        for round in &rounds {
            let Some(url) = &round.url else {
                tracing::debug!(round = round.round, date = %round.date, "No stats link yet, skipping");
                continue;
            };

            let html = self.paced_fetch(url, cancel).await?;
            let records = self.stats.parse_records(&html);
            tracing::info!(
                %source,
                round = round.round,
                records = records.len(),
                "Extracted round stats"
            );

            batches
                .entry(round.round)
                .or_insert_with(|| PeriodBatch::new(source, round.round))
                .records
                .extend(records);
        }

        Ok(batches.into_values().collect())
    }

    async fn paced_fetch(&self, url: &str, cancel: &CancellationToken) -> Result<String, Error> {
        let slot = self.limiter.acquire_with_cancel(cancel).await?;
        let result = self.fetcher.fetch(url).await;
        self.limiter.release(slot).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::limiter::LimiterConfig;
    use crate::record::{RawRecord, RoundRef};
    use crate::testutil::{MockFetcher, MockScheduleParser, MockStatsParser};

    fn fast_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(LimiterConfig::new(
            100,
            Duration::from_millis(100),
        )))
    }

    fn round(n: u32, url: Option<&str>) -> RoundRef {
        RoundRef {
            round: n,
            date: format!("2025-08-{n:02}"),
            url: url.map(str::to_string),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn harvest_groups_records_by_round() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok("<html>schedule</html>".into()),
            Ok("<html>round one</html>".into()),
            Ok("<html>round one again</html>".into()),
            Ok("<html>round two</html>".into()),
        ]);
        let schedule = MockScheduleParser::new(vec![
            round(1, Some("http://host/r1a")),
            round(1, Some("http://host/r1b")),
            round(2, Some("http://host/r2")),
        ]);
        let stats = MockStatsParser::new(vec![
            vec![RawRecord::new().with("player", "A").with("goals", 1.0)],
            vec![RawRecord::new().with("player", "B").with("goals", 2.0)],
            vec![RawRecord::new().with("player", "C").with("goals", 3.0)],
        ]);

        let service = HarvestService::new(fetcher.clone(), schedule, stats, fast_limiter());
        let batches = service
            .harvest("league", "http://host/schedule", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].period, 1);
        assert_eq!(batches[0].records.len(), 2);
        assert_eq!(batches[1].period, 2);
        assert_eq!(batches[1].records.len(), 1);
        assert_eq!(
            fetcher.requested(),
            vec![
                "http://host/schedule",
                "http://host/r1a",
                "http://host/r1b",
                "http://host/r2",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rounds_without_links_are_skipped() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok("<html>schedule</html>".into()),
            Ok("<html>round one</html>".into()),
        ]);
        let schedule =
            MockScheduleParser::new(vec![round(1, Some("http://host/r1")), round(2, None)]);
        let stats = MockStatsParser::new(vec![vec![RawRecord::new().with("player", "A")]]);

        let service = HarvestService::new(fetcher.clone(), schedule, stats, fast_limiter());
        let batches = service
            .harvest("league", "http://host/schedule", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(fetcher.requested().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_schedule_yields_no_batches() {
        let fetcher = MockFetcher::new("<html>nothing here</html>");
        let schedule = MockScheduleParser::new(vec![]);
        let stats = MockStatsParser::new(vec![]);

        let service = HarvestService::new(fetcher.clone(), schedule, stats, fast_limiter());
        let batches = service
            .harvest("league", "http://host/schedule", &CancellationToken::new())
            .await
            .unwrap();

        assert!(batches.is_empty());
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_propagate() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok("<html>schedule</html>".into()),
            Err(Error::NotFound {
                url: "http://host/r1".into(),
            }),
        ]);
        let schedule = MockScheduleParser::new(vec![round(1, Some("http://host/r1"))]);
        let stats = MockStatsParser::new(vec![]);

        let service = HarvestService::new(fetcher, schedule, stats, fast_limiter());
        let err = service
            .harvest("league", "http://host/schedule", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_harvest() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok("<html>schedule</html>".into()),
            Ok("<html>round one</html>".into()),
        ]);
        let schedule = MockScheduleParser::new(vec![
            round(1, Some("http://host/r1")),
            round(2, Some("http://host/r2")),
        ]);
        let stats = MockStatsParser::new(vec![vec![RawRecord::new().with("player", "A")]]);

        // One request per minute: the second round fetch must suspend.
        let limiter = Arc::new(RateLimiter::new(LimiterConfig::new(
            1,
            Duration::from_secs(60),
        )));
        let service = HarvestService::new(fetcher, schedule, stats, limiter);

        let token = CancellationToken::new();
        let task = tokio::spawn({
            let token = token.clone();
            async move {
                service
                    .harvest("league", "http://host/schedule", &token)
                    .await
            }
        });

        tokio::task::yield_now().await;
        token.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
