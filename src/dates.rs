use chrono::format::ParseErrorKind;
use chrono::NaiveDate;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct DateFormat {
    pattern: String,
}

impl DateFormat {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
        }
    }

    fn parse(&self, input: &str) -> Option<NaiveDate> {
        match NaiveDate::parse_from_str(input, &self.pattern) {
            Ok(date) => Some(date),
            // Month-resolution patterns land on the first of the month.
            Err(err) if err.kind() == ParseErrorKind::NotEnough => {
                let padded = format!("{input}|01");
                let pattern = format!("{}|%d", self.pattern);
                NaiveDate::parse_from_str(&padded, &pattern).ok()
            }
            Err(_) => None,
        }
    }
}

/// Parses loosely formatted dates against an ordered list of `chrono` patterns.
///
/// Patterns are tried strictly in the order given and the first success wins.
/// Some inputs are ambiguous between patterns, so the order is part of the
/// contract: reordering it changes which rows parse and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateNormalizer {
    formats: Vec<DateFormat>,
}

impl DateNormalizer {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            formats: patterns
                .iter()
                .map(|pattern| DateFormat::new(pattern.as_ref()))
                .collect(),
        }
    }

    pub fn parse(&self, input: &str) -> Result<NaiveDate> {
        let trimmed = input.trim();
        if !trimmed.is_empty() {
            if let Some(date) = self.formats.iter().find_map(|format| format.parse(trimmed)) {
                return Ok(date);
            }
        }

        Err(EngineError::UnparseableDate {
            input: input.to_string(),
            attempted: self.formats.len(),
        })
    }
}
