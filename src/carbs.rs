//! Adaptive carbohydrate limiter
//!
//! The daily carb ceiling is the protocol baseline plus what activity has earned
//! (steps and workout energy), scaled down by sleep debt and by an active symptom.
//! Without a real workout bonus the pre-penalty total is capped, so step counting
//! alone cannot unlock a large allowance.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::{normalize_severity_factor, ActiveSymptom, DailyBioSnapshot, WorkoutCategory};

/// Steps above which the step bonus starts accruing
pub const STEPS_BONUS_FLOOR: u32 = 6000;

/// Grams earned per 1000 steps above the floor
pub const GRAMS_PER_THOUSAND_STEPS: f64 = 5.0;

/// Active kcal per gram of workout bonus (before the category multiplier)
pub const KCAL_PER_WORKOUT_GRAM: f64 = 20.0;

/// Symptom factor for gut-related symptoms
pub const GUT_SYMPTOM_FACTOR: f64 = 0.5;

/// Symptom factor for fatigue / cognitive symptoms
pub const FATIGUE_SYMPTOM_FACTOR: f64 = 0.7;

/// Symptom factor for anything else
pub const OTHER_SYMPTOM_FACTOR: f64 = 0.8;

const GUT_KEYWORDS: &[&str] = &[
    "bloat", "gonfi", "nausea", "cramp", "diarr", "reflux", "heartburn", "gas", "stomach",
    "constipation", "gut", "pancia",
];

const FATIGUE_KEYWORDS: &[&str] = &[
    "fatigue", "tired", "fog", "headache", "dizz", "stanch", "mal di testa", "brain", "focus",
];

/// Grams earned by walking beyond the daily floor
pub fn steps_bonus(steps: u32) -> f64 {
    if steps > STEPS_BONUS_FLOOR {
        (steps - STEPS_BONUS_FLOOR) as f64 / 1000.0 * GRAMS_PER_THOUSAND_STEPS
    } else {
        0.0
    }
}

/// Multiplier applied to active energy, by last workout category
pub fn workout_multiplier(category: Option<WorkoutCategory>) -> f64 {
    match category {
        Some(WorkoutCategory::Anaerobic) => 1.5,
        Some(WorkoutCategory::AerobicIntense) => 1.2,
        Some(WorkoutCategory::Low) => 0.8,
        None => 1.0,
    }
}

/// Grams earned by active energy expenditure
pub fn workout_bonus(active_kcal: f64, category: Option<WorkoutCategory>) -> f64 {
    (active_kcal.max(0.0) / KCAL_PER_WORKOUT_GRAM) * workout_multiplier(category)
}

/// Sleep-debt multiplier: 1.0 from 7h, 0.9 from 6h, 0.75 below
pub fn sleep_factor(effective_sleep_hours: f64) -> f64 {
    if effective_sleep_hours >= 7.0 {
        1.0
    } else if effective_sleep_hours >= 6.0 {
        0.9
    } else {
        0.75
    }
}

/// Carb penalty a newly logged symptom sets for the rest of the day
pub fn symptom_severity_factor(symptom: &str) -> f64 {
    let lowered = symptom.to_lowercase();
    if GUT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        GUT_SYMPTOM_FACTOR
    } else if FATIGUE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        FATIGUE_SYMPTOM_FACTOR
    } else {
        OTHER_SYMPTOM_FACTOR
    }
}

/// Multiplier for the currently active symptom, 1.0 when there is none.
///
/// The factor is normalized here as well, since snapshots may arrive as raw JSON.
pub fn symptom_factor(active: Option<&ActiveSymptom>) -> f64 {
    active.map_or(1.0, |s| normalize_severity_factor(s.severity_factor))
}

/// Where the final limit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarbLimitSource {
    /// Caller-supplied dynamic limit
    Override,
    /// Computed from activity, sleep and symptoms
    Computed,
}

/// Inputs of the limiter, each already resolved to grams or a multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbLimitInputs {
    pub base_target_g: f64,
    pub steps_bonus_g: f64,
    pub workout_bonus_g: f64,
    pub sleep_factor: f64,
    pub symptom_factor: f64,
    pub explicit_override_g: Option<f64>,
}

/// Limiter result with the intermediate values that explain it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbLimit {
    /// Final daily ceiling
    pub grams: u32,
    pub source: CarbLimitSource,
    /// Baseline + bonuses, after the safety cap
    pub pre_penalty_g: f64,
    /// Whether the safety cap lowered the pre-penalty total
    pub capped: bool,
    /// Pre-penalty total times the sleep and symptom factors, unrounded
    pub penalized_g: f64,
}

/// Adaptive daily carbohydrate ceiling
#[derive(Debug, Clone)]
pub struct CarbLimiter {
    safety_cap_g: f64,
    cap_threshold_g: f64,
    default_sleep_hours: f64,
}

impl Default for CarbLimiter {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CarbLimiter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            safety_cap_g: config.carb_safety_cap_g,
            cap_threshold_g: config.workout_bonus_cap_threshold_g,
            default_sleep_hours: config.default_sleep_hours,
        }
    }

    /// Resolve limiter inputs from a daily snapshot
    pub fn inputs_for(
        &self,
        snapshot: &DailyBioSnapshot,
        base_target_g: f64,
        explicit_override_g: Option<f64>,
    ) -> CarbLimitInputs {
        let effective_sleep = snapshot.sleep_hours.unwrap_or(self.default_sleep_hours);

        CarbLimitInputs {
            base_target_g,
            steps_bonus_g: steps_bonus(snapshot.steps),
            workout_bonus_g: workout_bonus(
                snapshot.active_energy_kcal,
                snapshot.last_workout_category,
            ),
            sleep_factor: sleep_factor(effective_sleep),
            symptom_factor: symptom_factor(snapshot.symptom_active.as_ref()),
            explicit_override_g,
        }
    }

    /// Compute the daily ceiling.
    ///
    /// The sleep and symptom factors multiply. A valid explicit override wins
    /// outright; the computed values are still reported alongside it.
    pub fn compute(&self, inputs: &CarbLimitInputs) -> CarbLimit {
        let mut pre_penalty =
            inputs.base_target_g + inputs.steps_bonus_g + inputs.workout_bonus_g;

        let mut capped = false;
        if inputs.workout_bonus_g <= self.cap_threshold_g && pre_penalty > self.safety_cap_g {
            pre_penalty = self.safety_cap_g;
            capped = true;
        }

        let penalized = pre_penalty * inputs.sleep_factor * inputs.symptom_factor;

        let (grams, source) = match inputs.explicit_override_g {
            Some(limit) if limit.is_finite() && limit >= 0.0 => {
                (limit.round() as u32, CarbLimitSource::Override)
            }
            _ => (penalized.max(0.0).round() as u32, CarbLimitSource::Computed),
        };

        CarbLimit {
            grams,
            source,
            pre_penalty_g: pre_penalty,
            capped,
            penalized_g: penalized,
        }
    }
}
