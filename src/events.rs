use chrono::Datelike;
use tracing::{debug, info, warn};

use crate::dates::DateNormalizer;
use crate::error::{EngineError, Result};
use crate::models::{EventRecord, EventRow, NormalizationReport};
use crate::series::KeywordDirectory;
use crate::tags::{canonical_label, canonical_tag};

#[derive(Debug, Clone, PartialEq)]
pub struct EventSet {
    pub records: Vec<EventRecord>,
    pub report: NormalizationReport,
}

impl EventSet {
    /// Records kept for audit that can never take part in matching.
    pub fn untagged(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter().filter(|record| record.tag.is_none())
    }
}

/// Turns raw event rows into dated records. Rows whose date fails every
/// pattern are dropped and listed in the report.
///
/// When the directory knows a record's keyword, its department replaces the
/// one on the row.
pub fn normalize_events(
    rows: &[EventRow],
    normalizer: &DateNormalizer,
    directory: &KeywordDirectory,
) -> Result<EventSet> {
    let mut report = NormalizationReport::default();
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        report.rows_seen += 1;
        let date = match normalizer.parse(&row.date) {
            Ok(date) => date,
            Err(err) => {
                debug!(entity = %row.entity_id, error = %err, "dropping event row");
                report.record_unparseable(&row.date);
                continue;
            }
        };
        report.rows_kept += 1;

        let keyword = canonical_label(row.keyword.as_deref());
        let department = keyword
            .as_deref()
            .and_then(|keyword| directory.department_for(keyword))
            .map(str::to_string)
            .or_else(|| canonical_label(row.department.as_deref()));

        records.push(EventRecord {
            entity_id: row.entity_id.trim().to_string(),
            tag: canonical_tag(row.tag.as_deref()),
            date,
            event_year: date.year(),
            keyword,
            category: canonical_label(row.category.as_deref()),
            department,
            activity: row.activity.trim().to_string(),
            content: row.content.clone(),
        });
    }

    if report.rows_dropped() > 0 {
        warn!(
            dropped = report.rows_dropped(),
            dates = ?report.unparseable_dates,
            "event rows with unparseable dates were dropped"
        );
    }

    if records.is_empty() {
        return Err(EngineError::EmptyInputBatch { what: "event" });
    }

    info!(records = records.len(), "normalized event records");
    Ok(EventSet { records, report })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::Settings;

    fn row(date: &str, tag: Option<&str>, keyword: Option<&str>) -> EventRow {
        EventRow {
            date: date.to_string(),
            entity_id: " Kim ".to_string(),
            tag: tag.map(str::to_string),
            keyword: keyword.map(str::to_string),
            department: Some("Undeclared".to_string()),
            activity: "Science club".to_string(),
            content: "Built a Go engine".to_string(),
            ..EventRow::default()
        }
    }

    fn normalizer() -> DateNormalizer {
        DateNormalizer::new(&Settings::default().event_date_formats)
    }

    #[test]
    fn parses_dates_and_derives_year() {
        let set = normalize_events(
            &[row("15-Sep-16", Some("ai"), None)],
            &normalizer(),
            &KeywordDirectory::new(),
        )
        .unwrap();
        let record = &set.records[0];
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2016, 9, 15).unwrap());
        assert_eq!(record.event_year, 2016);
        assert_eq!(record.entity_id, "Kim");
        assert_eq!(record.department.as_deref(), Some("Undeclared"));
    }

    #[test]
    fn blank_tags_are_kept_for_audit() {
        let set = normalize_events(
            &[row("15-Sep-16", Some(" "), None), row("16-Sep-16", Some("ai"), None)],
            &normalizer(),
            &KeywordDirectory::new(),
        )
        .unwrap();
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.untagged().count(), 1);
    }

    #[test]
    fn directory_overrides_row_department() {
        let directory = KeywordDirectory::from_pairs([("AlphaGo", "Computer Science")]);
        let set = normalize_events(
            &[row("15-Sep-16", Some("ai"), Some("AlphaGo"))],
            &normalizer(),
            &directory,
        )
        .unwrap();
        assert_eq!(set.records[0].department.as_deref(), Some("Computer Science"));
    }

    #[test]
    fn unparseable_rows_are_dropped_and_reported() {
        let set = normalize_events(
            &[row("someday", Some("ai"), None), row("15-Sep-16", Some("ai"), None)],
            &normalizer(),
            &KeywordDirectory::new(),
        )
        .unwrap();
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.report.rows_dropped(), 1);
        assert_eq!(set.report.unparseable_dates, vec!["someday".to_string()]);
    }

    #[test]
    fn nothing_left_is_an_empty_batch() {
        let err = normalize_events(
            &[row("someday", Some("ai"), None)],
            &normalizer(),
            &KeywordDirectory::new(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::EmptyInputBatch { what: "event" });
    }
}
