use std::collections::BTreeMap;

use tracing::debug;

use crate::config::LagBounds;
use crate::error::{EngineError, Result};
use crate::models::{LagEstimate, LagStatistic, MatchedPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Department,
    Keyword,
    Category,
    Entity,
}

impl GroupBy {
    /// Department is keyed by the series, the same way pending series are
    /// looked up for forecasting. The record's department only fills in when
    /// the series has none.
    pub fn key_for(&self, pair: &MatchedPair) -> Option<String> {
        match self {
            GroupBy::Department => pair
                .series_department
                .clone()
                .or_else(|| pair.record.department.clone()),
            GroupBy::Keyword => Some(pair.key.keyword.clone()),
            GroupBy::Category => Some(pair.key.category.clone()),
            GroupBy::Entity => Some(pair.record.entity_id.clone()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Department => "department",
            GroupBy::Keyword => "keyword",
            GroupBy::Category => "category",
            GroupBy::Entity => "entity",
        }
    }
}

#[derive(Default)]
struct Accumulator {
    admissible: Vec<f64>,
    excluded: usize,
}

impl Accumulator {
    fn estimate(&self) -> LagEstimate {
        if self.admissible.is_empty() {
            return LagEstimate::Insufficient;
        }
        let n = self.admissible.len() as f64;
        let mean = self.admissible.iter().sum::<f64>() / n;
        let variance = self
            .admissible
            .iter()
            .map(|lag| (lag - mean).powi(2))
            .sum::<f64>()
            / n;
        LagEstimate::Sufficient { mean, variance }
    }
}

/// Mean and population variance of lags per grouping key, counting only lags
/// inside `bounds`. Keys whose lags were all excluded still appear, marked
/// `Insufficient`. Pairs without a grouping key are skipped.
pub fn lag_statistics<'p, I, F>(pairs: I, bounds: LagBounds, key_fn: F) -> Vec<LagStatistic>
where
    I: IntoIterator<Item = &'p MatchedPair>,
    F: Fn(&MatchedPair) -> Option<String>,
{
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();

    for pair in pairs {
        let Some(key) = key_fn(pair) else {
            debug!(series = %pair.key, entity = %pair.record.entity_id, "pair has no grouping key");
            continue;
        };
        let entry = groups.entry(key).or_default();
        if bounds.admits(pair.lag_years) {
            entry.admissible.push(pair.lag_years);
        } else {
            entry.excluded += 1;
        }
    }

    groups
        .into_iter()
        .map(|(key, acc)| LagStatistic {
            estimate: acc.estimate(),
            sample_count: acc.admissible.len(),
            excluded_count: acc.excluded,
            bounds,
            key,
        })
        .collect()
}

pub fn lag_statistics_by<'p, I>(pairs: I, bounds: LagBounds, group_by: GroupBy) -> Vec<LagStatistic>
where
    I: IntoIterator<Item = &'p MatchedPair>,
{
    lag_statistics(pairs, bounds, |pair| group_by.key_for(pair))
}

impl LagStatistic {
    pub fn mean_lag(&self) -> Result<f64> {
        match self.estimate {
            LagEstimate::Sufficient { mean, .. } => Ok(mean),
            LagEstimate::Insufficient => Err(EngineError::InsufficientLagData {
                key: self.key.clone(),
            }),
        }
    }

    pub fn variance(&self) -> Option<f64> {
        match self.estimate {
            LagEstimate::Sufficient { variance, .. } => Some(variance),
            LagEstimate::Insufficient => None,
        }
    }
}

/// Looks up `key`; an absent key is as insufficient as an empty one.
pub fn statistic_for<'s>(stats: &'s [LagStatistic], key: &str) -> Result<&'s LagStatistic> {
    stats
        .iter()
        .find(|stat| stat.key == key)
        .ok_or_else(|| EngineError::InsufficientLagData {
            key: key.to_string(),
        })
}
