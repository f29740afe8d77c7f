//! Composite physiological scores
//!
//! Four independent 0-100 scores (readiness, CNS battery, glycogen, hydration), the
//! coach message chosen from them, and the sodium advice line driven by weather and
//! movement.

use serde::{Deserialize, Serialize};

/// Lower bound of every score
pub const SCORE_MIN: f64 = 0.0;

/// Upper bound of every score
pub const SCORE_MAX: f64 = 100.0;

/// Sleep hours treated as a full night
pub const FULL_NIGHT_HOURS: f64 = 8.0;

/// HRV (ms) mapped to zero
pub const HRV_FLOOR_MS: f64 = 20.0;

/// HRV span (ms) from zero to full
pub const HRV_SPAN_MS: f64 = 80.0;

/// Temperature at which the hydration score takes no heat penalty
pub const NEUTRAL_TEMP_C: f64 = 20.0;

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        SCORE_MIN
    } else {
        value.clamp(SCORE_MIN, SCORE_MAX)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn sleep_ratio(sleep_hours: f64) -> f64 {
    (sleep_hours / FULL_NIGHT_HOURS).min(1.0)
}

/// Readiness from sleep and HRV; sleep stands in for HRV when there is no sensor
pub fn readiness(sleep_hours: f64, hrv_ms: Option<f64>) -> f64 {
    let sleep = sleep_ratio(sleep_hours);
    let hrv_norm = match hrv_ms {
        Some(hrv) => clamp_unit((hrv - HRV_FLOOR_MS) / HRV_SPAN_MS),
        None => sleep,
    };
    clamp_score(sleep * 50.0 + hrv_norm * 50.0)
}

/// Central nervous system battery
pub fn cns_battery(sleep_hours: f64, hrv_ms: Option<f64>) -> f64 {
    match hrv_ms {
        Some(hrv) => clamp_score((hrv - HRV_FLOOR_MS) / HRV_SPAN_MS * 100.0),
        None => clamp_score(sleep_hours / FULL_NIGHT_HOURS * 100.0),
    }
}

/// Muscle glycogen: expenditure depletes, carbohydrate intake replenishes
pub fn glycogen(active_kcal: f64, today_carbs_g: f64) -> f64 {
    clamp_score(100.0 - active_kcal / 15.0 + (today_carbs_g / 10.0) * 2.0)
}

/// Hydration: heat and movement both increase estimated fluid loss
pub fn hydration(ambient_temp_c: f64, steps: u32) -> f64 {
    clamp_score(100.0 - (ambient_temp_c - NEUTRAL_TEMP_C) * 2.0 - steps as f64 / 2000.0)
}

/// The four composite scores for one day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysiologyScores {
    pub readiness: f64,
    pub cns_battery: f64,
    pub glycogen: f64,
    pub hydration: f64,
}

impl PhysiologyScores {
    pub fn compute(
        sleep_hours: f64,
        hrv_ms: Option<f64>,
        active_kcal: f64,
        today_carbs_g: f64,
        ambient_temp_c: f64,
        steps: u32,
    ) -> Self {
        Self {
            readiness: readiness(sleep_hours, hrv_ms),
            cns_battery: cns_battery(sleep_hours, hrv_ms),
            glycogen: glycogen(active_kcal, today_carbs_g),
            hydration: hydration(ambient_temp_c, steps),
        }
    }
}

/// Coach thresholds
pub const COLD_WEATHER_C: f64 = 5.0;
pub const LOW_READINESS: f64 = 40.0;
pub const LOW_CNS_BATTERY: f64 = 35.0;
pub const PUSH_READINESS: f64 = 80.0;

/// Message shown under the scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachMessage {
    Loading,
    ColdWeather,
    LowReadiness,
    LowCnsBattery,
    Push,
    Neutral,
}

impl CoachMessage {
    /// Pick the first matching message, in priority order
    pub fn select(scores: Option<&PhysiologyScores>, ambient_temp_c: f64) -> Self {
        let Some(scores) = scores else {
            return CoachMessage::Loading;
        };

        if ambient_temp_c < COLD_WEATHER_C {
            CoachMessage::ColdWeather
        } else if scores.readiness < LOW_READINESS {
            CoachMessage::LowReadiness
        } else if scores.cns_battery < LOW_CNS_BATTERY {
            CoachMessage::LowCnsBattery
        } else if scores.readiness >= PUSH_READINESS {
            CoachMessage::Push
        } else {
            CoachMessage::Neutral
        }
    }

    /// Stable identifier for hosts that localize the text
    pub fn code(&self) -> &'static str {
        match self {
            CoachMessage::Loading => "loading",
            CoachMessage::ColdWeather => "cold_weather",
            CoachMessage::LowReadiness => "low_readiness",
            CoachMessage::LowCnsBattery => "low_cns_battery",
            CoachMessage::Push => "push",
            CoachMessage::Neutral => "neutral",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            CoachMessage::Loading => "Reading today's data...",
            CoachMessage::ColdWeather => {
                "Cold outside: warm up longer and keep electrolytes up even if you are not thirsty."
            }
            CoachMessage::LowReadiness => {
                "Recovery is low today. Favor walking or mobility over intensity."
            }
            CoachMessage::LowCnsBattery => {
                "Nervous system is drained. Skip heavy lifts and prioritize sleep tonight."
            }
            CoachMessage::Push => "You are well recovered. Good day to push a hard session.",
            CoachMessage::Neutral => "Steady day. Train as planned and stick to your targets.",
        }
    }
}

/// How much extra sodium the day calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SodiumLevel {
    Baseline,
    Elevated,
    High,
}

/// Sodium advice line for the weather card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SodiumAdvice {
    pub level: SodiumLevel,
    /// Suggested sodium on top of food, in mg
    pub extra_sodium_mg: u32,
    pub text: String,
}

/// Sodium advice from ambient temperature and step count
pub fn sodium_advice(ambient_temp_c: f64, steps: u32) -> SodiumAdvice {
    let level = if ambient_temp_c >= 30.0 || steps > 15_000 {
        SodiumLevel::High
    } else if ambient_temp_c >= 25.0 || steps > 10_000 {
        SodiumLevel::Elevated
    } else {
        SodiumLevel::Baseline
    };

    let (extra_sodium_mg, text) = match level {
        SodiumLevel::High => (
            2000,
            format!(
                "{ambient_temp_c:.0}°C and {steps} steps: add about 2 g of sodium (1 tsp salt) across the day."
            ),
        ),
        SodiumLevel::Elevated => (
            1000,
            format!(
                "{ambient_temp_c:.0}°C and {steps} steps: add about 1 g of sodium, e.g. salted broth."
            ),
        ),
        SodiumLevel::Baseline => (
            0,
            "Usual sodium intake is enough today; salt your food to taste.".to_string(),
        ),
    };

    SodiumAdvice {
        level,
        extra_sodium_mg,
        text,
    }
}
