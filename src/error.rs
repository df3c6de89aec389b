use thiserror::Error;

use crate::models::SeriesKey;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("date {input:?} did not match any of {attempted} configured formats")]
    UnparseableDate { input: String, attempted: usize },

    #[error("series {key} has no tag configured and cannot be matched")]
    UnmatchableSeries { key: SeriesKey },

    #[error("no admissible lag samples for grouping key {key:?}")]
    InsufficientLagData { key: String },

    #[error("projected year {year} is outside the supported calendar range")]
    DateOutOfRange { year: i32 },

    #[error("{what} batch produced no valid entries after normalization")]
    EmptyInputBatch { what: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("unknown profile {0:?}")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
