//! Blood ketone estimation
//!
//! A piecewise fasting-duration model: flat while fed, a slow ramp through the first
//! half day, then a steeper carbohydrate-dependent climb. Activity adds a bonus, and
//! yesterday's carbohydrate load dampens the result to model residual insulin and
//! glycogen suppression of ketogenesis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::{IntakeKind, IntakeLogEntry};

/// Net carbs today above which the estimate is pinned out of ketosis
pub const OUT_OF_KETOSIS_CARBS_G: f64 = 50.0;

/// Estimate returned when out of ketosis
pub const OUT_OF_KETOSIS_MMOL: f64 = 0.1;

/// Upper bound of the estimate (mmol/L)
pub const MAX_KETONES_MMOL: f64 = 3.5;

/// Yesterday's carbohydrate load and last meal time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarbMemory {
    #[serde(default)]
    pub yesterday_carbs_g: f64,
    #[serde(default)]
    pub last_meal_yesterday: Option<DateTime<Utc>>,
}

/// Ketone level from fasting duration and today's net carbs, before bonuses
pub fn base_level(hours_fasted: f64, net_carbs_today: f64) -> f64 {
    if hours_fasted < 4.0 {
        0.1
    } else if hours_fasted < 12.0 {
        0.1 + (hours_fasted - 4.0) / 8.0 * 0.2
    } else {
        let slope = if net_carbs_today < 10.0 {
            0.045
        } else if net_carbs_today <= 20.0 {
            0.032
        } else {
            0.02
        };
        0.25 + (hours_fasted - 12.0) * slope
    }
}

/// Post-exercise and movement bonus
pub fn activity_bonus(steps: u32, logs: &[IntakeLogEntry]) -> f64 {
    let steps_bonus = if steps > 10_000 {
        0.08
    } else if steps > 5_000 {
        0.04
    } else {
        0.0
    };
    let workout_bonus = if logs.iter().any(|entry| entry.kind == IntakeKind::Workout) {
        0.12
    } else {
        0.0
    };
    steps_bonus + workout_bonus
}

/// Dampen an estimate by yesterday's carbohydrate intake
pub fn dampen_for_yesterday(ketones: f64, yesterday_carbs_g: f64, hours_fasted: f64) -> f64 {
    if yesterday_carbs_g > 50.0 {
        ketones.min(0.12 + hours_fasted * 0.018) * 0.5
    } else if yesterday_carbs_g >= 25.0 {
        let damped = ketones * 0.55;
        if hours_fasted < 16.0 {
            damped.min(0.35)
        } else {
            damped
        }
    } else if yesterday_carbs_g >= 15.0 {
        let damped = ketones * 0.75;
        if hours_fasted < 14.0 {
            damped.min(0.4)
        } else {
            damped
        }
    } else {
        ketones
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Estimator for blood beta-hydroxybutyrate (mmol/L)
#[derive(Debug, Clone)]
pub struct KetoneEstimator {
    default_hours_fasted: f64,
}

impl Default for KetoneEstimator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl KetoneEstimator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_hours_fasted: config.default_hours_fasted,
        }
    }

    /// Hours since the latest timed meal today, else since yesterday's last meal,
    /// else the configured default
    pub fn hours_fasted(
        &self,
        logs: &[IntakeLogEntry],
        memory: &CarbMemory,
        now: DateTime<Utc>,
    ) -> f64 {
        let last_meal_today = logs
            .iter()
            .filter(|entry| entry.kind == IntakeKind::Meal)
            .filter_map(|entry| entry.logged_at)
            .max();

        match last_meal_today.or(memory.last_meal_yesterday) {
            Some(last_meal) => ((now - last_meal).num_seconds() as f64 / 3600.0).max(0.0),
            None => self.default_hours_fasted,
        }
    }

    /// Estimate blood ketones, rounded to one decimal
    pub fn estimate(
        &self,
        logs: &[IntakeLogEntry],
        net_carbs_today: f64,
        steps: u32,
        memory: &CarbMemory,
        now: DateTime<Utc>,
    ) -> f64 {
        if net_carbs_today > OUT_OF_KETOSIS_CARBS_G {
            return OUT_OF_KETOSIS_MMOL;
        }

        let hours_fasted = self.hours_fasted(logs, memory, now);
        let ketones = base_level(hours_fasted, net_carbs_today) + activity_bonus(steps, logs);
        let ketones = dampen_for_yesterday(ketones, memory.yesterday_carbs_g, hours_fasted);

        round_one_decimal(ketones.clamp(0.0, MAX_KETONES_MMOL))
    }
}
