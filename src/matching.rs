use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::YearWindow;
use crate::error::{EngineError, Result};
use crate::models::{EventRecord, MatchedPair, SeriesKey, SignalSeries};

pub const DAYS_PER_YEAR: f64 = 365.25;

/// Signed distance from `peak` to `event` in fractional years.
pub fn lag_years(peak: NaiveDate, event: NaiveDate) -> f64 {
    (event - peak).num_days() as f64 / DAYS_PER_YEAR
}

fn pair(series: &SignalSeries, record: &EventRecord) -> MatchedPair {
    MatchedPair {
        key: series.key().clone(),
        series_department: series.department().map(str::to_string),
        peak_date: series.peak_date(),
        record: record.clone(),
        lag_years: lag_years(series.peak_date(), record.date),
    }
}

fn in_window(series: &SignalSeries, record: &EventRecord, window: YearWindow) -> bool {
    window.contains(record.event_year - series.peak_year())
}

/// Every record sharing the series' tag whose year offset from the peak year
/// falls inside `window`. A series without a tag is `UnmatchableSeries`, which
/// is distinct from an empty match.
pub fn match_series(
    series: &SignalSeries,
    records: &[EventRecord],
    window: YearWindow,
) -> Result<Vec<MatchedPair>> {
    let tag = series.tag().ok_or_else(|| EngineError::UnmatchableSeries {
        key: series.key().clone(),
    })?;

    Ok(records
        .iter()
        .filter(|record| record.tag.as_deref() == Some(tag))
        .filter(|record| in_window(series, record, window))
        .map(|record| pair(series, record))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeriesOutcome {
    /// The series has no tag configured.
    Unmatchable,
    /// Tag configured, but no record in the window yet.
    NoActivity,
    Matched { pairs: Vec<MatchedPair> },
}

impl SeriesOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SeriesOutcome::Unmatchable => "unmatchable",
            SeriesOutcome::NoActivity => "no_activity",
            SeriesOutcome::Matched { .. } => "matched",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMatch {
    pub key: SeriesKey,
    pub department: Option<String>,
    pub peak_date: NaiveDate,
    pub peak_count: u64,
    pub outcome: SeriesOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub window: YearWindow,
    pub series: Vec<SeriesMatch>,
    /// Records with no tag; they are never matched.
    pub untagged_records: usize,
}

impl MatchReport {
    pub fn pairs(&self) -> impl Iterator<Item = &MatchedPair> {
        self.series.iter().flat_map(|entry| match &entry.outcome {
            SeriesOutcome::Matched { pairs } => pairs.as_slice(),
            _ => &[][..],
        })
    }

    pub fn unmatchable(&self) -> impl Iterator<Item = &SeriesMatch> {
        self.series
            .iter()
            .filter(|entry| entry.outcome == SeriesOutcome::Unmatchable)
    }

    pub fn without_activity(&self) -> impl Iterator<Item = &SeriesMatch> {
        self.series
            .iter()
            .filter(|entry| entry.outcome == SeriesOutcome::NoActivity)
    }
}

/// Runs the matcher over every series, indexing records by tag once.
pub fn match_all(series: &[SignalSeries], records: &[EventRecord], window: YearWindow) -> MatchReport {
    let mut by_tag: HashMap<&str, Vec<&EventRecord>> = HashMap::new();
    let mut untagged_records = 0usize;
    for record in records {
        match record.tag.as_deref() {
            Some(tag) => by_tag.entry(tag).or_default().push(record),
            None => untagged_records += 1,
        }
    }

    let entries = series
        .iter()
        .map(|series| {
            let outcome = match series.tag() {
                None => SeriesOutcome::Unmatchable,
                Some(tag) => {
                    let pairs: Vec<MatchedPair> = by_tag
                        .get(tag)
                        .into_iter()
                        .flatten()
                        .filter(|record| in_window(series, record, window))
                        .map(|record| pair(series, record))
                        .collect();
                    if pairs.is_empty() {
                        SeriesOutcome::NoActivity
                    } else {
                        SeriesOutcome::Matched { pairs }
                    }
                }
            };
            debug!(series = %series.key(), outcome = outcome.label(), "matched series");
            SeriesMatch {
                key: series.key().clone(),
                department: series.department().map(str::to_string),
                peak_date: series.peak_date(),
                peak_count: series.peak_count(),
                outcome,
            }
        })
        .collect();

    MatchReport {
        window,
        series: entries,
        untagged_records,
    }
}

pub fn records_for_entity(records: &[EventRecord], entity_id: &str) -> Vec<EventRecord> {
    records
        .iter()
        .filter(|record| record.entity_id == entity_id)
        .cloned()
        .collect()
}

pub fn series_in_category(series: &[SignalSeries], category: &str) -> Vec<SignalSeries> {
    series
        .iter()
        .filter(|series| series.key().category == category)
        .cloned()
        .collect()
}
