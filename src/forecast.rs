use chrono::{Datelike, Days, NaiveDate};
use tracing::{debug, info};

use crate::config::ForecastAnchor;
use crate::error::{EngineError, Result};
use crate::lag::{statistic_for, GroupBy};
use crate::matching::{MatchReport, SeriesMatch};
use crate::models::{Forecast, LagStatistic, SeriesKey};

const DAYS_PER_PROJECTED_YEAR: f64 = 365.0;

/// Splits a fractional-year lag into whole years and a day offset. The day
/// offset rounds half to even, so 0.5 years is 182 days.
///
/// Returns `None` when the lag is not finite or its whole years do not fit a
/// calendar year offset.
pub fn decompose_lag(mean_lag: f64) -> Option<(i32, i64)> {
    if !mean_lag.is_finite() {
        return None;
    }
    let whole_years = mean_lag.floor();
    if whole_years < f64::from(i32::MIN) || whole_years > f64::from(i32::MAX) {
        return None;
    }
    let day_offset = ((mean_lag - whole_years) * DAYS_PER_PROJECTED_YEAR).round_ties_even();
    Some((whole_years as i32, day_offset as i64))
}

/// Projects the event date for a series peak:
/// `anchor in (peak year + whole years)` plus the day offset.
///
/// Only the peak's year feeds the projection; the anchor fixes month and day.
pub fn project(
    key: &SeriesKey,
    peak_date: NaiveDate,
    statistic: &LagStatistic,
    anchor: ForecastAnchor,
) -> Result<Forecast> {
    let mean_lag = statistic.mean_lag()?;
    let peak_year = peak_date.year();
    let (whole_years, day_offset) =
        decompose_lag(mean_lag).ok_or(EngineError::DateOutOfRange { year: peak_year })?;

    let base_year = peak_year
        .checked_add(whole_years)
        .ok_or(EngineError::DateOutOfRange { year: peak_year })?;
    let base = anchor
        .in_year(base_year)
        .ok_or(EngineError::DateOutOfRange { year: base_year })?;
    let projected_date = base
        .checked_add_days(Days::new(day_offset.max(0) as u64))
        .ok_or(EngineError::DateOutOfRange { year: base_year })?;

    debug!(series = %key, %peak_date, mean_lag, %projected_date, "projected event date");

    Ok(Forecast {
        key: key.clone(),
        grouping_key: statistic.key.clone(),
        peak_date,
        mean_lag,
        whole_years,
        day_offset,
        anchor,
        projected_date,
        sample_count: statistic.sample_count,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingForecast {
    pub key: SeriesKey,
    pub grouping_key: Option<String>,
    pub outcome: Result<Forecast>,
}

fn series_group_key(entry: &SeriesMatch, group_by: GroupBy) -> Option<String> {
    match group_by {
        GroupBy::Department => entry.department.clone(),
        GroupBy::Keyword => Some(entry.key.keyword.clone()),
        GroupBy::Category => Some(entry.key.category.clone()),
        GroupBy::Entity => None,
    }
}

/// Forecasts every tagged series that has no matched event yet, using the lag
/// statistic of its grouping key. Series with no usable statistic carry
/// `InsufficientLagData` instead of a date.
pub fn forecast_pending(
    report: &MatchReport,
    stats: &[LagStatistic],
    group_by: GroupBy,
    anchor: ForecastAnchor,
) -> Vec<PendingForecast> {
    let forecasts: Vec<PendingForecast> = report
        .without_activity()
        .map(|entry| {
            let grouping_key = series_group_key(entry, group_by);
            let outcome = match grouping_key.as_deref() {
                Some(group) => statistic_for(stats, group)
                    .and_then(|stat| project(&entry.key, entry.peak_date, stat, anchor)),
                None => Err(EngineError::InsufficientLagData {
                    key: format!("{} (no {})", entry.key, group_by.as_str()),
                }),
            };
            PendingForecast {
                key: entry.key.clone(),
                grouping_key,
                outcome,
            }
        })
        .collect();

    info!(
        pending = forecasts.len(),
        projected = forecasts.iter().filter(|f| f.outcome.is_ok()).count(),
        "forecast pending series"
    );
    forecasts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LagBounds, YearWindow};
    use crate::matching::SeriesOutcome;
    use crate::models::LagEstimate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(keyword: &str) -> SeriesKey {
        SeriesKey {
            category: "Health".to_string(),
            keyword: keyword.to_string(),
            tag: Some("bio".to_string()),
        }
    }

    fn statistic(key: &str, estimate: LagEstimate, sample_count: usize) -> LagStatistic {
        LagStatistic {
            key: key.to_string(),
            sample_count,
            excluded_count: 0,
            bounds: LagBounds::new(0.0, 5.0),
            estimate,
        }
    }

    #[test]
    fn half_year_rounds_to_even_day_count() {
        assert_eq!(decompose_lag(1.5), Some((1, 182)));
        assert_eq!(decompose_lag(0.25), Some((0, 91)));
        assert_eq!(decompose_lag(2.0), Some((2, 0)));
    }

    #[test]
    fn unrepresentable_lag_is_out_of_range() {
        assert_eq!(decompose_lag(f64::NAN), None);
        assert_eq!(decompose_lag(f64::INFINITY), None);
        assert_eq!(decompose_lag(1e12), None);

        for mean in [1e12, f64::from(i32::MAX), -1e12] {
            let stat = statistic("Nursing", LagEstimate::Sufficient { mean, variance: 0.0 }, 1);
            let result = project(&key("RSV"), ymd(2025, 10, 1), &stat, ForecastAnchor::JANUARY_FIRST);
            assert!(
                matches!(result, Err(EngineError::DateOutOfRange { .. })),
                "mean {mean} gave {result:?}"
            );
        }
    }

    #[test]
    fn projects_from_year_anchor() {
        let stat = statistic(
            "Nursing",
            LagEstimate::Sufficient { mean: 1.5, variance: 0.0 },
            4,
        );
        let forecast = project(&key("RSV"), ymd(2025, 10, 1), &stat, ForecastAnchor::JANUARY_FIRST)
            .unwrap();
        assert_eq!(forecast.projected_date, ymd(2026, 7, 2));
        assert_eq!(forecast.whole_years, 1);
        assert_eq!(forecast.day_offset, 182);
        assert_eq!(forecast.sample_count, 4);
    }

    #[test]
    fn anchor_choice_shifts_the_projection() {
        let stat = statistic(
            "Nursing",
            LagEstimate::Sufficient { mean: 0.0, variance: 0.0 },
            1,
        );
        let january = project(&key("RSV"), ymd(2025, 10, 1), &stat, ForecastAnchor::JANUARY_FIRST)
            .unwrap();
        let november = project(&key("RSV"), ymd(2025, 10, 1), &stat, ForecastAnchor::NOVEMBER_FIRST)
            .unwrap();
        assert_eq!(january.projected_date, ymd(2025, 1, 1));
        assert_eq!(november.projected_date, ymd(2025, 11, 1));
    }

    #[test]
    fn refuses_without_samples() {
        let stat = statistic("Nursing", LagEstimate::Insufficient, 0);
        let err = project(&key("RSV"), ymd(2025, 10, 1), &stat, ForecastAnchor::JANUARY_FIRST)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientLagData {
                key: "Nursing".to_string()
            }
        );
    }

    #[test]
    fn pending_series_use_their_group_statistic() {
        let report = MatchReport {
            window: YearWindow::new(0, 5),
            series: vec![
                SeriesMatch {
                    key: key("RSV"),
                    department: Some("Nursing".to_string()),
                    peak_date: ymd(2025, 10, 1),
                    peak_count: 90,
                    outcome: SeriesOutcome::NoActivity,
                },
                SeriesMatch {
                    key: key("Mpox"),
                    department: Some("Pharmacy".to_string()),
                    peak_date: ymd(2025, 6, 1),
                    peak_count: 40,
                    outcome: SeriesOutcome::NoActivity,
                },
                SeriesMatch {
                    key: key("Flu"),
                    department: Some("Nursing".to_string()),
                    peak_date: ymd(2019, 1, 1),
                    peak_count: 10,
                    outcome: SeriesOutcome::Unmatchable,
                },
            ],
            untagged_records: 0,
        };
        let stats = vec![statistic(
            "Nursing",
            LagEstimate::Sufficient { mean: 1.5, variance: 0.1 },
            3,
        )];

        let pending = forecast_pending(&report, &stats, GroupBy::Department, ForecastAnchor::JANUARY_FIRST);
        assert_eq!(pending.len(), 2);
        assert_eq!(
            pending[0].outcome.as_ref().unwrap().projected_date,
            ymd(2026, 7, 2)
        );
        assert!(matches!(
            pending[1].outcome,
            Err(EngineError::InsufficientLagData { .. })
        ));
    }
}
