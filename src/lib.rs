//! Correlates keyword mention series with tagged event records: normalizes
//! dates, aggregates series, matches events by tag and year window, summarizes
//! peak-to-event lags and projects event dates for series still waiting on
//! activity.

pub mod analysis;
pub mod config;
pub mod dates;
pub mod error;
pub mod events;
pub mod forecast;
pub mod ingest;
pub mod lag;
pub mod matching;
pub mod models;
pub mod report;
pub mod series;
pub mod tags;

pub use analysis::{analyze, Analysis, AnalysisOptions};
pub use config::{ForecastAnchor, LagBounds, Profile, Settings, YearWindow};
pub use dates::DateNormalizer;
pub use error::{ConfigError, EngineError, Result};
pub use lag::GroupBy;
pub use models::{
    EventRecord, EventRow, Forecast, LagEstimate, LagStatistic, MatchedPair, SeriesKey,
    SignalBatch, SignalPoint, SignalRow, SignalSeries,
};
pub use series::{KeywordDirectory, SeriesAggregator};
