use crate::config::{Profile, Settings};
use crate::dates::DateNormalizer;
use crate::error::Result;
use crate::events::{normalize_events, EventSet};
use crate::forecast::{forecast_pending, PendingForecast};
use crate::lag::{lag_statistics_by, GroupBy};
use crate::matching::{match_all, records_for_entity, series_in_category, MatchReport};
use crate::models::{EventRow, LagStatistic, SignalBatch};
use crate::series::{Aggregation, KeywordDirectory, SeriesAggregator};

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub group_by: GroupBy,
    pub category: Option<String>,
    pub entity: Option<String>,
    /// Explicit keyword to department entries, layered over what the signal
    /// batches declare.
    pub directory: KeywordDirectory,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            group_by: GroupBy::Department,
            category: None,
            entity: None,
            directory: KeywordDirectory::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub profile: Profile,
    pub signals: Aggregation,
    pub events: EventSet,
    pub matches: MatchReport,
    pub stats: Vec<LagStatistic>,
    pub forecasts: Vec<PendingForecast>,
}

/// One full batch run: normalize, aggregate, match, summarize lags, forecast.
/// Nothing carries over between calls.
pub fn analyze(
    settings: &Settings,
    profile: &Profile,
    batches: &[SignalBatch],
    event_rows: &[EventRow],
    options: &AnalysisOptions,
) -> Result<Analysis> {
    let mut directory = KeywordDirectory::from_signal_batches(batches);
    directory.merge(&options.directory);

    let signal_dates = DateNormalizer::new(&settings.signal_date_formats);
    let event_dates = DateNormalizer::new(&settings.event_date_formats);

    let signals = SeriesAggregator::new(&signal_dates, &directory).aggregate(batches)?;
    let events = normalize_events(event_rows, &event_dates, &directory)?;

    let series = match options.category.as_deref() {
        Some(category) => series_in_category(&signals.series, category),
        None => signals.series.clone(),
    };
    let records = match options.entity.as_deref() {
        Some(entity) => records_for_entity(&events.records, entity),
        None => events.records.clone(),
    };

    let matches = match_all(&series, &records, profile.match_window);
    let stats = lag_statistics_by(matches.pairs(), profile.lag_bounds, options.group_by);
    let forecasts = forecast_pending(&matches, &stats, options.group_by, profile.anchor);

    Ok(Analysis {
        profile: *profile,
        signals,
        events,
        matches,
        stats,
        forecasts,
    })
}
