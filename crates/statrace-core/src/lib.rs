//! Core engines for statrace: request scheduling, source merging, and
//! leaderboard aggregation. Network and markup concerns live in
//! `statrace-client`; this crate only defines the trait seams they plug
//! into.

pub mod aggregate;
pub mod error;
pub mod limiter;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod testutil;
pub mod traits;
pub mod weights;

pub use aggregate::{ChartConfig, ValueMode, aggregate};
pub use error::Error;
pub use limiter::{LimiterConfig, PacedFetcher, RateLimiter, ScheduleSlot};
pub use merge::merge_sources;
pub use pipeline::HarvestService;
pub use record::{FieldValue, Frame, FrameEntry, PeriodBatch, RawRecord, RoundRef};
pub use traits::{Fetcher, ScheduleParser, StatsParser};
