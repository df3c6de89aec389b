use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const COARSE_PROFILE: &str = "coarse";
pub const CALIBRATION_PROFILE: &str = "calibration";

/// Inclusive range of `event_year - peak_year` offsets accepted by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub min_offset: i32,
    pub max_offset: i32,
}

impl YearWindow {
    pub const fn new(min_offset: i32, max_offset: i32) -> Self {
        Self {
            min_offset,
            max_offset,
        }
    }

    pub fn contains(&self, offset: i32) -> bool {
        (self.min_offset..=self.max_offset).contains(&offset)
    }
}

/// Inclusive admissible range for lags, in fractional years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagBounds {
    pub lower: f64,
    pub upper: f64,
}

impl LagBounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn admits(&self, lag_years: f64) -> bool {
        lag_years >= self.lower && lag_years <= self.upper
    }
}

/// Month and day used as the base date of a projection year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AnchorFields")]
pub struct ForecastAnchor {
    month: u32,
    day: u32,
}

#[derive(Deserialize)]
struct AnchorFields {
    month: u32,
    day: u32,
}

impl TryFrom<AnchorFields> for ForecastAnchor {
    type Error = ConfigError;

    fn try_from(fields: AnchorFields) -> Result<Self, Self::Error> {
        ForecastAnchor::new(fields.month, fields.day)
    }
}

impl ForecastAnchor {
    pub const JANUARY_FIRST: ForecastAnchor = ForecastAnchor { month: 1, day: 1 };
    pub const NOVEMBER_FIRST: ForecastAnchor = ForecastAnchor { month: 11, day: 1 };

    /// Rejects month/day pairs that do not exist in every year (Feb 29).
    pub fn new(month: u32, day: u32) -> Result<Self, ConfigError> {
        NaiveDate::from_ymd_opt(2001, month, day)
            .map(|_| Self { month, day })
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "forecast anchor {month:02}-{day:02} is not a valid day in every year"
                ))
            })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub match_window: YearWindow,
    pub lag_bounds: LagBounds,
    pub anchor: ForecastAnchor,
}

impl Profile {
    /// Same-year-or-next matching with a two year lag ceiling.
    pub const fn coarse() -> Self {
        Self {
            match_window: YearWindow::new(0, 1),
            lag_bounds: LagBounds::new(0.0, 2.0),
            anchor: ForecastAnchor::JANUARY_FIRST,
        }
    }

    /// Wide window used to calibrate long-range forecasts.
    pub const fn calibration() -> Self {
        Self {
            match_window: YearWindow::new(0, 5),
            lag_bounds: LagBounds::new(0.0, 5.0),
            anchor: ForecastAnchor::NOVEMBER_FIRST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub signal_date_formats: Vec<String>,
    pub event_date_formats: Vec<String>,
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(COARSE_PROFILE.to_string(), Profile::coarse());
        profiles.insert(CALIBRATION_PROFILE.to_string(), Profile::calibration());

        Self {
            signal_date_formats: vec![
                "%y-%b".to_string(),
                "%b-%y".to_string(),
                "%Y-%m".to_string(),
            ],
            event_date_formats: vec![
                "%d-%b-%y".to_string(),
                "%y-%b".to_string(),
                "%b-%y".to_string(),
            ],
            profiles,
        }
    }
}

/// On-disk shape; every field is optional and layered over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    signal_date_formats: Option<Vec<String>>,
    event_date_formats: Option<Vec<String>>,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: SettingsFile = toml::from_str(content)?;
        let mut settings = Settings::default();

        if let Some(formats) = file.signal_date_formats {
            settings.signal_date_formats = formats;
        }
        if let Some(formats) = file.event_date_formats {
            settings.event_date_formats = formats;
        }
        settings.profiles.extend(file.profiles);

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signal_date_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "signal_date_formats must list at least one pattern".to_string(),
            ));
        }
        if self.event_date_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "event_date_formats must list at least one pattern".to_string(),
            ));
        }

        for (name, profile) in &self.profiles {
            let window = profile.match_window;
            if window.min_offset > window.max_offset {
                return Err(ConfigError::Invalid(format!(
                    "profile {name}: match_window min_offset {} exceeds max_offset {}",
                    window.min_offset, window.max_offset
                )));
            }
            let bounds = profile.lag_bounds;
            if !bounds.lower.is_finite() || !bounds.upper.is_finite() || bounds.lower > bounds.upper
            {
                return Err(ConfigError::Invalid(format!(
                    "profile {name}: lag_bounds [{}, {}] must be finite with lower <= upper",
                    bounds.lower, bounds.upper
                )));
            }
        }

        Ok(())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_both_observed_profiles() {
        let settings = Settings::default();
        let coarse = settings.profile(COARSE_PROFILE).unwrap();
        assert_eq!(coarse.match_window, YearWindow::new(0, 1));
        assert_eq!(coarse.lag_bounds.upper, 2.0);
        assert_eq!(coarse.anchor, ForecastAnchor::JANUARY_FIRST);

        let calibration = settings.profile(CALIBRATION_PROFILE).unwrap();
        assert_eq!(calibration.match_window, YearWindow::new(0, 5));
        assert_eq!(calibration.anchor.month(), 11);
    }

    #[test]
    fn toml_overrides_layer_over_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            signal_date_formats = ["%Y-%m"]

            [profiles.coarse]
            match_window = { min_offset = 0, max_offset = 2 }
            lag_bounds = { lower = 0.0, upper = 3.0 }
            anchor = { month = 3, day = 1 }

            [profiles.tight]
            match_window = { min_offset = 0, max_offset = 0 }
            lag_bounds = { lower = 0.0, upper = 1.0 }
            anchor = { month = 1, day = 1 }
            "#,
        )
        .unwrap();

        assert_eq!(settings.signal_date_formats, vec!["%Y-%m".to_string()]);
        assert_eq!(settings.event_date_formats.len(), 3);
        assert_eq!(settings.profile("coarse").unwrap().match_window.max_offset, 2);
        assert!(settings.profile("tight").is_ok());
        assert!(settings.profile(CALIBRATION_PROFILE).is_ok());
    }

    #[test]
    fn rejects_leap_day_anchor() {
        let err = Settings::from_toml_str(
            r#"
            [profiles.bad]
            match_window = { min_offset = 0, max_offset = 1 }
            lag_bounds = { lower = 0.0, upper = 2.0 }
            anchor = { month = 2, day = 29 }
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_inverted_window_and_bounds() {
        let mut settings = Settings::default();
        settings.profiles.insert(
            "inverted".to_string(),
            Profile {
                match_window: YearWindow::new(2, 1),
                ..Profile::coarse()
            },
        );
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.profiles.insert(
            "inverted".to_string(),
            Profile {
                lag_bounds: LagBounds::new(3.0, 1.0),
                ..Profile::coarse()
            },
        );
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_bounds() {
        for bounds in [
            LagBounds::new(0.0, f64::NAN),
            LagBounds::new(f64::NAN, 2.0),
            LagBounds::new(f64::NEG_INFINITY, 2.0),
            LagBounds::new(0.0, f64::INFINITY),
        ] {
            let mut settings = Settings::default();
            settings.profiles.insert(
                "unbounded".to_string(),
                Profile {
                    lag_bounds: bounds,
                    ..Profile::coarse()
                },
            );
            assert!(
                matches!(settings.validate(), Err(ConfigError::Invalid(_))),
                "bounds {bounds:?} passed validation"
            );
        }
    }

    #[test]
    fn unknown_profile_is_reported() {
        let settings = Settings::default();
        assert!(matches!(
            settings.profile("weekly"),
            Err(ConfigError::UnknownProfile(name)) if name == "weekly"
        ));
    }

    #[test]
    fn window_and_bounds_are_inclusive() {
        let window = YearWindow::new(0, 1);
        assert!(window.contains(0));
        assert!(window.contains(1));
        assert!(!window.contains(2));
        assert!(!window.contains(-1));

        let bounds = LagBounds::new(0.0, 2.0);
        assert!(bounds.admits(0.0));
        assert!(bounds.admits(2.0));
        assert!(!bounds.admits(-0.1));
        assert!(!bounds.admits(2.01));
    }
}
