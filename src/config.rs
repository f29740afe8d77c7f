//! Engine configuration and user profile
//!
//! `EngineConfig` carries the tunable thresholds of the inference engine. The
//! correlation window, the episode threshold and the Clue/Evidence cut-offs have no
//! derivation behind them, so they are parameters rather than constants.
//!
//! `Profile` is the slice of the key-value profile store the engine reads: body
//! metrics, protocol baselines and the symptom-factor record of the day.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::carbs::symptom_severity_factor;
use crate::error::ComputeError;
use crate::types::{normalize_severity_factor, ActiveSymptom};

/// Default look-back window before a symptom episode, in hours
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Longest accepted look-back window, one leap year in hours
pub const MAX_LOOKBACK_HOURS: i64 = 24 * 366;

/// Tunable engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hours before a symptom episode in which events count as candidates
    pub lookback_hours: i64,
    /// Fraction of episodes an event must precede to be reported
    pub correlation_threshold_ratio: f64,
    /// Minimum distinct symptom dates for a "Clue"
    pub clue_min_dates: u32,
    /// Minimum distinct symptom dates for "Evidence"
    pub evidence_min_dates: u32,
    /// Pre-penalty carb ceiling applied when no workout bonus was earned
    pub carb_safety_cap_g: f64,
    /// Workout bonus at or below which the safety cap applies
    pub workout_bonus_cap_threshold_g: f64,
    /// Sleep assumed when the sensor reports nothing
    pub default_sleep_hours: f64,
    /// Temperature assumed when the weather lookup is unavailable
    pub default_ambient_temp_c: f64,
    /// Fasting duration assumed when no meal time is known
    pub default_hours_fasted: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            correlation_threshold_ratio: 0.5,
            clue_min_dates: 2,
            evidence_min_dates: 3,
            carb_safety_cap_g: 50.0,
            workout_bonus_cap_threshold_g: 5.0,
            default_sleep_hours: 7.5,
            default_ambient_temp_c: 20.0,
            default_hours_fasted: 12.0,
        }
    }
}

impl EngineConfig {
    /// Check that the parameters describe a usable engine
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(1..=MAX_LOOKBACK_HOURS).contains(&self.lookback_hours) {
            return Err(ComputeError::ConfigError(format!(
                "lookback_hours must be in 1..={MAX_LOOKBACK_HOURS}, got {}",
                self.lookback_hours
            )));
        }
        if !(self.correlation_threshold_ratio > 0.0 && self.correlation_threshold_ratio <= 1.0) {
            return Err(ComputeError::ConfigError(format!(
                "correlation_threshold_ratio must be in (0, 1], got {}",
                self.correlation_threshold_ratio
            )));
        }
        if self.clue_min_dates == 0 || self.evidence_min_dates <= self.clue_min_dates {
            return Err(ComputeError::ConfigError(format!(
                "expected 0 < clue_min_dates < evidence_min_dates, got {} and {}",
                self.clue_min_dates, self.evidence_min_dates
            )));
        }
        if self.carb_safety_cap_g <= 0.0 || self.default_sleep_hours <= 0.0 {
            return Err(ComputeError::ConfigError(
                "carb_safety_cap_g and default_sleep_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Look-back window, clamped to `0..=MAX_LOOKBACK_HOURS` for unvalidated configs
    pub fn lookback(&self) -> Duration {
        Duration::hours(self.lookback_hours.clamp(0, MAX_LOOKBACK_HOURS))
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let json = fs::read_to_string(path).map_err(|e| {
            ComputeError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// Symptom penalty persisted by the profile store.
///
/// The record expires at the end of the day it was set on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomFactorRecord {
    pub symptom: String,
    pub factor: f64,
    pub set_on: NaiveDate,
}

impl SymptomFactorRecord {
    /// Build the record written when a symptom is logged
    pub fn for_today(symptom: &str, today: NaiveDate) -> Self {
        Self {
            symptom: symptom.to_string(),
            factor: symptom_severity_factor(symptom),
            set_on: today,
        }
    }

    /// The active symptom on `today`, or `None` once the record has expired
    pub fn active_on(&self, today: NaiveDate) -> Option<ActiveSymptom> {
        if self.set_on == today {
            Some(ActiveSymptom {
                name: self.symptom.clone(),
                severity_factor: normalize_severity_factor(self.factor),
            })
        } else {
            None
        }
    }
}

/// User profile values consumed by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub body_weight_kg: f64,
    #[serde(default)]
    pub height_cm: Option<f64>,
    /// Protocol baseline carbohydrate target (grams)
    pub base_carbs_g: f64,
    /// Protocol baseline protein target (grams)
    pub base_protein_g: f64,
    /// Dynamic carb limit set explicitly by the user or a coach; wins outright
    #[serde(default)]
    pub carb_limit_override_g: Option<f64>,
    #[serde(default)]
    pub symptom_factor: Option<SymptomFactorRecord>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            body_weight_kg: 70.0,
            height_cm: None,
            base_carbs_g: 25.0,
            base_protein_g: 100.0,
            carb_limit_override_g: None,
            symptom_factor: None,
        }
    }
}

impl Profile {
    /// Load a profile from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Active symptom penalty for `today`, if the stored record is still valid
    pub fn active_symptom(&self, today: NaiveDate) -> Option<ActiveSymptom> {
        self.symptom_factor
            .as_ref()
            .and_then(|record| record.active_on(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"lookback_hours": 48}"#).unwrap();
        assert_eq!(config.lookback_hours, 48);
        assert_eq!(config.clue_min_dates, 2);
        assert_eq!(config.evidence_min_dates, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(EngineConfig::from_json(r#"{"correlation_threshold_ratio": 0.0}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"lookback_hours": 0}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"lookback_hours": 3000000000}"#).is_err());
        assert!(
            EngineConfig::from_json(r#"{"clue_min_dates": 3, "evidence_min_dates": 3}"#).is_err()
        );
    }

    #[test]
    fn test_lookback_is_bounded() {
        let huge = EngineConfig {
            lookback_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(huge.lookback(), Duration::hours(MAX_LOOKBACK_HOURS));
        assert_eq!(EngineConfig::default().lookback(), Duration::hours(24));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = EngineConfig {
            lookback_hours: 36,
            ..Default::default()
        };
        let loaded = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_symptom_record_expires_next_day() {
        let record = SymptomFactorRecord::for_today("Bloating", day(10));
        assert_eq!(record.factor, 0.5);

        let active = record.active_on(day(10)).unwrap();
        assert_eq!(active.name, "Bloating");
        assert!(record.active_on(day(11)).is_none());
    }

    #[test]
    fn test_profile_active_symptom() {
        let profile = Profile {
            symptom_factor: Some(SymptomFactorRecord::for_today("Headache", day(5))),
            ..Default::default()
        };
        assert_eq!(profile.active_symptom(day(5)).unwrap().severity_factor, 0.7);
        assert!(profile.active_symptom(day(6)).is_none());
        assert!(Profile::default().active_symptom(day(5)).is_none());
    }
}
