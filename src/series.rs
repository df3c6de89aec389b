use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::dates::DateNormalizer;
use crate::error::{EngineError, Result};
use crate::models::{
    NormalizationReport, SeriesKey, SignalBatch, SignalPoint, SignalSeries,
};
use crate::tags::{canonical_label, canonical_tag};

/// Keyword to department lookup, injected into aggregation instead of living
/// in a static table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordDirectory {
    departments: HashMap<String, String>,
}

impl KeywordDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut directory = Self::new();
        for (keyword, department) in pairs {
            directory.insert(keyword, department);
        }
        directory
    }

    /// Learns departments from the `department` column of signal rows. Later
    /// batches overwrite earlier ones; superseded batches are ignored.
    pub fn from_signal_batches(batches: &[SignalBatch]) -> Self {
        let mut directory = Self::new();
        for batch in batches.iter().filter(|batch| !batch.superseded) {
            for row in &batch.rows {
                if let Some(department) = canonical_label(row.department.as_deref()) {
                    directory.insert(row.keyword.trim(), department);
                }
            }
        }
        directory
    }

    pub fn insert(&mut self, keyword: impl Into<String>, department: impl Into<String>) {
        let keyword: String = keyword.into();
        self.departments
            .insert(keyword.trim().to_string(), department.into());
    }

    /// Entries from `other` take precedence.
    pub fn merge(&mut self, other: &KeywordDirectory) {
        for (keyword, department) in &other.departments {
            self.departments.insert(keyword.clone(), department.clone());
        }
    }

    pub fn department_for(&self, keyword: &str) -> Option<&str> {
        self.departments.get(keyword.trim()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub series: Vec<SignalSeries>,
    pub report: NormalizationReport,
}

#[derive(Default)]
struct PendingSeries {
    tag: Option<String>,
    department: Option<String>,
    points: Vec<SignalPoint>,
}

/// Merges partial signal batches into one series per (category, keyword).
///
/// Rows are concatenated, never deduplicated. The last batch to define a tag
/// for a keyword wins; rows without a tag leave the current definition alone.
pub struct SeriesAggregator<'a> {
    normalizer: &'a DateNormalizer,
    directory: &'a KeywordDirectory,
}

impl<'a> SeriesAggregator<'a> {
    pub fn new(normalizer: &'a DateNormalizer, directory: &'a KeywordDirectory) -> Self {
        Self {
            normalizer,
            directory,
        }
    }

    pub fn aggregate(&self, batches: &[SignalBatch]) -> Result<Aggregation> {
        let mut report = NormalizationReport::default();
        let mut pending: BTreeMap<(String, String), PendingSeries> = BTreeMap::new();

        for batch in batches {
            if batch.superseded {
                info!(batch = %batch.label, rows = batch.rows.len(), "skipping superseded signal batch");
                report.skipped_batches.push(batch.label.clone());
                continue;
            }

            let mut dropped = 0usize;
            for row in &batch.rows {
                report.rows_seen += 1;
                let date = match self.normalizer.parse(&row.date) {
                    Ok(date) => date,
                    Err(err) => {
                        debug!(batch = %batch.label, keyword = %row.keyword, error = %err, "dropping signal row");
                        report.record_unparseable(&row.date);
                        dropped += 1;
                        continue;
                    }
                };
                report.rows_kept += 1;

                let entry = pending
                    .entry((row.category.trim().to_string(), row.keyword.trim().to_string()))
                    .or_default();
                if let Some(tag) = canonical_tag(row.tag.as_deref()) {
                    entry.tag = Some(tag);
                }
                if let Some(department) = canonical_label(row.department.as_deref()) {
                    entry.department = Some(department);
                }
                entry.points.push(SignalPoint {
                    date,
                    count: row.count,
                });
            }

            if dropped > 0 {
                warn!(batch = %batch.label, dropped, "signal rows with unparseable dates were dropped");
            }
        }

        let series: Vec<SignalSeries> = pending
            .into_iter()
            .filter_map(|((category, keyword), entry)| {
                let department = self
                    .directory
                    .department_for(&keyword)
                    .map(str::to_string)
                    .or(entry.department);
                let key = SeriesKey {
                    category,
                    keyword,
                    tag: entry.tag,
                };
                SignalSeries::new(key, department, entry.points)
            })
            .collect();

        if series.is_empty() {
            return Err(EngineError::EmptyInputBatch { what: "signal" });
        }

        info!(
            series = series.len(),
            rows_kept = report.rows_kept,
            rows_dropped = report.rows_dropped(),
            "aggregated signal series"
        );

        Ok(Aggregation { series, report })
    }
}
