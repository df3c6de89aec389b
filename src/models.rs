use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{ForecastAnchor, LagBounds};

/// Raw signal row as handed over by ingestion, before date normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRow {
    pub date: String,
    pub category: String,
    pub keyword: String,
    pub tag: Option<String>,
    pub department: Option<String>,
    pub count: u64,
}

/// One partial table of signal rows, e.g. everything from a single year file.
#[derive(Debug, Clone)]
pub struct SignalBatch {
    pub label: String,
    pub rows: Vec<SignalRow>,
    pub superseded: bool,
}

impl SignalBatch {
    pub fn new(label: impl Into<String>, rows: Vec<SignalRow>) -> Self {
        Self {
            label: label.into(),
            rows,
            superseded: false,
        }
    }

    pub fn superseded(mut self) -> Self {
        self.superseded = true;
        self
    }
}

/// Raw event row, e.g. one line of a student record sheet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRow {
    pub date: String,
    pub entity_id: String,
    pub tag: Option<String>,
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub activity: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeriesKey {
    pub category: String,
    pub keyword: String,
    pub tag: Option<String>,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}/{} [{}]", self.category, self.keyword, tag),
            None => write!(f, "{}/{}", self.category, self.keyword),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Date-ordered points for one key. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSeries {
    key: SeriesKey,
    department: Option<String>,
    points: Vec<SignalPoint>,
    #[serde(skip)]
    peak_index: usize,
}

impl SignalSeries {
    /// Returns `None` for an empty point set. Points are stably sorted by date,
    /// so duplicate dates keep their arrival order.
    pub fn new(
        key: SeriesKey,
        department: Option<String>,
        mut points: Vec<SignalPoint>,
    ) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        points.sort_by_key(|point| point.date);

        let mut peak_index = 0;
        for (idx, point) in points.iter().enumerate() {
            if point.count > points[peak_index].count {
                peak_index = idx;
            }
        }

        Some(Self {
            key,
            department,
            points,
            peak_index,
        })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn tag(&self) -> Option<&str> {
        self.key.tag.as_deref()
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    pub fn points(&self) -> &[SignalPoint] {
        &self.points
    }

    pub fn peak(&self) -> SignalPoint {
        self.points[self.peak_index]
    }

    pub fn peak_date(&self) -> NaiveDate {
        self.peak().date
    }

    pub fn peak_count(&self) -> u64 {
        self.peak().count
    }

    pub fn peak_year(&self) -> i32 {
        self.peak_date().year()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub entity_id: String,
    pub tag: Option<String>,
    pub date: NaiveDate,
    pub event_year: i32,
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub activity: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub key: SeriesKey,
    pub series_department: Option<String>,
    pub peak_date: NaiveDate,
    pub record: EventRecord,
    pub lag_years: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LagEstimate {
    Insufficient,
    Sufficient { mean: f64, variance: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagStatistic {
    pub key: String,
    pub sample_count: usize,
    pub excluded_count: usize,
    pub bounds: LagBounds,
    pub estimate: LagEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub key: SeriesKey,
    pub grouping_key: String,
    pub peak_date: NaiveDate,
    pub mean_lag: f64,
    pub whole_years: i32,
    pub day_offset: i64,
    pub anchor: ForecastAnchor,
    pub projected_date: NaiveDate,
    pub sample_count: usize,
}

/// Per-batch accounting of rows lost during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub rows_seen: usize,
    pub rows_kept: usize,
    pub unparseable_dates: Vec<String>,
    pub skipped_batches: Vec<String>,
}

impl NormalizationReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_seen - self.rows_kept
    }

    pub(crate) fn record_unparseable(&mut self, raw: &str) {
        if !self.unparseable_dates.iter().any(|seen| seen == raw) {
            self.unparseable_dates.push(raw.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(y: i32, m: u32, count: u64) -> SignalPoint {
        SignalPoint {
            date: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
            count,
        }
    }

    fn key() -> SeriesKey {
        SeriesKey {
            category: "IT".to_string(),
            keyword: "AlphaGo".to_string(),
            tag: Some("ai".to_string()),
        }
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(SignalSeries::new(key(), None, Vec::new()).is_none());
    }

    #[test]
    fn peak_ties_resolve_to_earliest_date() {
        let series = SignalSeries::new(
            key(),
            None,
            vec![point(2016, 9, 500), point(2016, 3, 500), point(2016, 5, 10)],
        )
        .unwrap();
        assert_eq!(series.peak_date(), NaiveDate::from_ymd_opt(2016, 3, 1).unwrap());
        assert_eq!(series.peak_count(), 500);
        assert_eq!(series.points()[0].date.month(), 3);
    }

    #[test]
    fn key_display_includes_tag_when_present() {
        assert_eq!(key().to_string(), "IT/AlphaGo [ai]");
        let untagged = SeriesKey { tag: None, ..key() };
        assert_eq!(untagged.to_string(), "IT/AlphaGo");
    }
}
