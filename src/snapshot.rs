//! Daily snapshot assembly
//!
//! Collaborators (sensor bridge, weather lookup, profile store, food log) each hand
//! over what they have. Any of them may be missing; the snapshot fills the gaps with
//! documented defaults instead of failing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, Profile};
use crate::types::{DailyBioSnapshot, IntakeKind, IntakeLogEntry, WorkoutCategory};

/// Today's reading from the device sensor bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub steps: u32,
    #[serde(default)]
    pub active_energy_kcal: f64,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub heart_rate_variability_ms: Option<f64>,
    #[serde(default)]
    pub last_workout_category: Option<WorkoutCategory>,
}

/// Current conditions from the weather lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub ambient_temp_c: f64,
}

/// Food and activity log for today, plus what is remembered of yesterday
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeDay {
    #[serde(default)]
    pub entries: Vec<IntakeLogEntry>,
    #[serde(default)]
    pub yesterday_carbs_grams: f64,
    #[serde(default)]
    pub yesterday_last_meal_at: Option<DateTime<Utc>>,
}

impl IntakeDay {
    /// Net carbs of today's meals
    pub fn net_carbs_today(&self) -> f64 {
        self.entries
            .iter()
            .filter(|entry| entry.kind == IntakeKind::Meal)
            .map(|entry| entry.net_carbs_g.max(0.0))
            .sum()
    }
}

impl DailyBioSnapshot {
    /// Build a snapshot from whatever the collaborators returned.
    ///
    /// A missing sensor reading counts as zero activity with unknown sleep and HRV.
    /// A missing or non-finite temperature falls back to the configured default.
    /// The profile's symptom record applies only on the day it was set.
    pub fn assemble(
        date: NaiveDate,
        sensor: Option<&SensorReading>,
        weather: Option<&WeatherReading>,
        profile: &Profile,
        intake: &IntakeDay,
        config: &EngineConfig,
    ) -> Self {
        let sensor = sensor.cloned().unwrap_or_default();
        let ambient_temp_c = weather
            .map(|w| w.ambient_temp_c)
            .filter(|t| t.is_finite())
            .or(Some(config.default_ambient_temp_c));

        Self {
            date,
            sleep_hours: sensor.sleep_hours.filter(|h| h.is_finite() && *h >= 0.0),
            steps: sensor.steps,
            active_energy_kcal: sensor.active_energy_kcal.max(0.0),
            heart_rate_variability_ms: sensor
                .heart_rate_variability_ms
                .filter(|hrv| hrv.is_finite()),
            last_workout_category: sensor.last_workout_category,
            today_carbs_grams: intake.net_carbs_today(),
            yesterday_carbs_grams: intake.yesterday_carbs_grams.max(0.0),
            ambient_temp_c,
            symptom_active: profile.active_symptom(date),
            intake_log: intake.entries.clone(),
            yesterday_last_meal_at: intake.yesterday_last_meal_at,
        }
    }

    /// Sleep hours with the configured default applied
    pub fn effective_sleep_hours(&self, config: &EngineConfig) -> f64 {
        self.sleep_hours.unwrap_or(config.default_sleep_hours)
    }

    /// Ambient temperature with the configured default applied
    pub fn effective_ambient_temp_c(&self, config: &EngineConfig) -> f64 {
        self.ambient_temp_c
            .filter(|t| t.is_finite())
            .unwrap_or(config.default_ambient_temp_c)
    }
}
