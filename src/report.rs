use std::fmt::Write;

use crate::config::Profile;
use crate::forecast::PendingForecast;
use crate::lag::GroupBy;
use crate::matching::{MatchReport, SeriesOutcome};
use crate::models::{LagEstimate, LagStatistic, NormalizationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeSummary {
    pub matched: usize,
    pub no_activity: usize,
    pub unmatchable: usize,
}

pub fn summarize_outcomes(report: &MatchReport) -> OutcomeSummary {
    let mut summary = OutcomeSummary::default();
    for entry in &report.series {
        match entry.outcome {
            SeriesOutcome::Matched { .. } => summary.matched += 1,
            SeriesOutcome::NoActivity => summary.no_activity += 1,
            SeriesOutcome::Unmatchable => summary.unmatchable += 1,
        }
    }
    summary
}

pub struct ReportInput<'a> {
    pub profile_name: &'a str,
    pub profile: &'a Profile,
    pub group_by: GroupBy,
    pub signals: &'a NormalizationReport,
    pub events: &'a NormalizationReport,
    pub matches: &'a MatchReport,
    pub stats: &'a [LagStatistic],
    pub forecasts: &'a [PendingForecast],
}

fn write_quality(output: &mut String, label: &str, report: &NormalizationReport) {
    let _ = writeln!(
        output,
        "- {}: {} of {} rows kept, {} dropped for unparseable dates",
        label,
        report.rows_kept,
        report.rows_seen,
        report.rows_dropped()
    );
    if !report.unparseable_dates.is_empty() {
        let _ = writeln!(output, "  - unparseable: {}", report.unparseable_dates.join(", "));
    }
    if !report.skipped_batches.is_empty() {
        let _ = writeln!(output, "  - superseded batches skipped: {}", report.skipped_batches.join(", "));
    }
}

/// One line of the lag table, shared by the report and the CLI.
pub fn lag_line(stat: &LagStatistic) -> String {
    match stat.estimate {
        LagEstimate::Sufficient { mean, variance } => format!(
            "- {}: mean {:.2} years (variance {:.3}) from {} samples, {} excluded",
            stat.key, mean, variance, stat.sample_count, stat.excluded_count
        ),
        LagEstimate::Insufficient => format!(
            "- {}: insufficient data ({} excluded)",
            stat.key, stat.excluded_count
        ),
    }
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();
    let profile = input.profile;

    let _ = writeln!(output, "# Trend-Event Lag Report");
    let _ = writeln!(
        output,
        "Profile `{}`: year window {}..={}, lag bounds [{}, {}] years, anchor {:02}-{:02}",
        input.profile_name,
        profile.match_window.min_offset,
        profile.match_window.max_offset,
        profile.lag_bounds.lower,
        profile.lag_bounds.upper,
        profile.anchor.month(),
        profile.anchor.day()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Input Quality");
    write_quality(&mut output, "Signal rows", input.signals);
    write_quality(&mut output, "Event rows", input.events);
    let _ = writeln!(
        output,
        "- {} event records carry no tag and are never matched",
        input.matches.untagged_records
    );

    let summary = summarize_outcomes(input.matches);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Series");
    let _ = writeln!(
        output,
        "{} matched, {} tagged without activity, {} without a tag",
        summary.matched, summary.no_activity, summary.unmatchable
    );
    let _ = writeln!(output);

    for entry in &input.matches.series {
        let status = match &entry.outcome {
            SeriesOutcome::Matched { pairs } => format!("{} matched records", pairs.len()),
            SeriesOutcome::NoActivity => "no activity in window yet".to_string(),
            SeriesOutcome::Unmatchable => "no tag configured".to_string(),
        };
        let _ = writeln!(
            output,
            "- {} peak {} ({} mentions): {}",
            entry.key, entry.peak_date, entry.peak_count, status
        );
    }

    let mut pairs: Vec<_> = input.matches.pairs().collect();
    pairs.sort_by(|a, b| b.record.date.cmp(&a.record.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Matched Records");

    if pairs.is_empty() {
        let _ = writeln!(output, "No records matched any series.");
    } else {
        for pair in pairs.iter().take(10) {
            let _ = writeln!(
                output,
                "- [{}] {} on {} for {} (lag {:.2} years)",
                pair.record.entity_id, pair.record.activity, pair.record.date, pair.key.keyword, pair.lag_years
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lag by {}", input.group_by.as_str());

    if input.stats.is_empty() {
        let _ = writeln!(output, "No matched pairs to summarize.");
    } else {
        for stat in input.stats {
            let _ = writeln!(output, "{}", lag_line(stat));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Forecasts");

    if input.forecasts.is_empty() {
        let _ = writeln!(output, "No tagged series are waiting on activity.");
    } else {
        for pending in input.forecasts {
            match &pending.outcome {
                Ok(forecast) => {
                    let _ = writeln!(
                        output,
                        "- {}: expected around {} (peak {}, mean lag {:.2} years over {} samples)",
                        pending.key,
                        forecast.projected_date,
                        forecast.peak_date,
                        forecast.mean_lag,
                        forecast.sample_count
                    );
                }
                Err(err) => {
                    let _ = writeln!(output, "- {}: no forecast, {}", pending.key, err);
                }
            }
        }
    }

    output
}
