//! Core types for the Metabolic Flux engine
//!
//! This module defines the data structures shared by every stage of the engine:
//! journal records (events and symptom episodes), the daily snapshot consumed by the
//! target pipeline, and the computed results handed back to the UI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Lowest accepted symptom intensity
pub const MIN_INTENSITY: u8 = 1;

/// Highest accepted symptom intensity
pub const MAX_INTENSITY: u8 = 10;

/// Journal event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Food,
    Workout,
    Weather,
    Sleep,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Food => "FOOD",
            EventType::Workout => "WORKOUT",
            EventType::Weather => "WEATHER",
            EventType::Sleep => "SLEEP",
        }
    }

    /// Parse the stored column value (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "FOOD" => Some(EventType::Food),
            "WORKOUT" => Some(EventType::Workout),
            "WEATHER" => Some(EventType::Weather),
            "SLEEP" => Some(EventType::Sleep),
            _ => None,
        }
    }
}

/// Event payload.
///
/// The discriminant is decided when the value is built and stored next to the
/// payload, so reads never have to guess the shape of what was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EventValue {
    Text(String),
    Number(f64),
    Structured(serde_json::Value),
}

impl EventValue {
    /// Discriminant as stored in the `value_kind` column
    pub fn kind(&self) -> &'static str {
        match self {
            EventValue::Text(_) => "text",
            EventValue::Number(_) => "number",
            EventValue::Structured(_) => "structured",
        }
    }

    /// Serialize for storage: text passes through, numbers are stringified,
    /// structured records are JSON-encoded.
    pub fn to_stored(&self) -> Result<String, ComputeError> {
        match self {
            EventValue::Text(text) => Ok(text.clone()),
            EventValue::Number(number) => Ok(number.to_string()),
            EventValue::Structured(value) => Ok(serde_json::to_string(value)?),
        }
    }

    /// Rebuild a value from its stored discriminant and raw column text
    pub fn from_stored(kind: &str, raw: &str) -> Result<Self, ComputeError> {
        match kind {
            "text" => Ok(EventValue::Text(raw.to_string())),
            "number" => raw
                .parse::<f64>()
                .map(EventValue::Number)
                .map_err(|e| ComputeError::ParseError(format!("number payload {raw:?}: {e}"))),
            "structured" => Ok(EventValue::Structured(serde_json::from_str(raw)?)),
            other => Err(ComputeError::ParseError(format!(
                "unknown value kind: {other}"
            ))),
        }
    }

    /// Payload typed by a user or host: the tagged form, any other JSON, or plain text
    pub fn from_input(raw: &str) -> Self {
        if let Ok(value) = serde_json::from_str::<EventValue>(raw) {
            return value;
        }
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(json) => EventValue::from(json),
            Err(_) => EventValue::Text(raw.to_string()),
        }
    }

    /// Ingredient list embedded in a structured food payload, if any.
    ///
    /// Non-string entries are ignored; an empty list yields `None`.
    pub fn ingredients(&self) -> Option<Vec<String>> {
        let EventValue::Structured(value) = self else {
            return None;
        };
        let list: Vec<String> = value
            .get("ingredients")?
            .as_array()?
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();

        if list.is_empty() {
            None
        } else {
            Some(list)
        }
    }
}

impl From<&str> for EventValue {
    fn from(text: &str) -> Self {
        EventValue::Text(text.to_string())
    }
}

impl From<String> for EventValue {
    fn from(text: String) -> Self {
        EventValue::Text(text)
    }
}

impl From<f64> for EventValue {
    fn from(number: f64) -> Self {
        EventValue::Number(number)
    }
}

impl From<serde_json::Value> for EventValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => EventValue::Text(text),
            serde_json::Value::Number(number) => match number.as_f64() {
                Some(n) => EventValue::Number(n),
                None => EventValue::Structured(serde_json::Value::Number(number)),
            },
            other => EventValue::Structured(other),
        }
    }
}

/// Append-only journal event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Surrogate key assigned by the store
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub name: String,
    pub value: EventValue,
    pub timestamp: DateTime<Utc>,
}

/// Append-only symptom self-report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomEpisode {
    pub id: i64,
    pub name: String,
    /// Intensity on a 1-10 scale (always clamped)
    pub intensity: u8,
    pub timestamp: DateTime<Utc>,
}

/// Clamp a raw intensity into the accepted 1-10 range
pub fn clamp_intensity(raw: i64) -> u8 {
    raw.clamp(MIN_INTENSITY as i64, MAX_INTENSITY as i64) as u8
}

/// Category of the most recent workout, as classified by the sensor bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutCategory {
    /// Strength / resistance training
    Anaerobic,
    /// High-intensity cardio
    AerobicIntense,
    /// Walking, yoga, easy cardio
    Low,
}

impl WorkoutCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutCategory::Anaerobic => "anaerobic",
            WorkoutCategory::AerobicIntense => "aerobic_intense",
            WorkoutCategory::Low => "low",
        }
    }
}

/// Lower bound applied to a symptom severity factor
pub const MIN_SEVERITY_FACTOR: f64 = 0.1;

/// Symptom currently penalizing the carbohydrate ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSymptom {
    pub name: String,
    /// Multiplier applied to the carb ceiling, normalized into [0.1, 1.0]
    pub severity_factor: f64,
}

impl ActiveSymptom {
    pub fn new(name: impl Into<String>, severity_factor: f64) -> Self {
        Self {
            name: name.into(),
            severity_factor: normalize_severity_factor(severity_factor),
        }
    }
}

/// Normalize a severity factor into [0.1, 1.0]; non-finite values mean "no penalty"
pub fn normalize_severity_factor(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(MIN_SEVERITY_FACTOR, 1.0)
    } else {
        1.0
    }
}

/// Kind of intake log entry seen by the ketone estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeKind {
    Meal,
    Workout,
}

/// One entry of today's meal/activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeLogEntry {
    pub kind: IntakeKind,
    /// When the entry was logged; entries without a time do not move the fasting clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub net_carbs_g: f64,
}

/// Fully-formed daily input to the target pipeline.
///
/// Built fresh for every computation; never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBioSnapshot {
    pub date: NaiveDate,
    /// Hours slept last night, `None` when the sensor had nothing
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub steps: u32,
    #[serde(default)]
    pub active_energy_kcal: f64,
    #[serde(default)]
    pub heart_rate_variability_ms: Option<f64>,
    #[serde(default)]
    pub last_workout_category: Option<WorkoutCategory>,
    #[serde(default)]
    pub today_carbs_grams: f64,
    #[serde(default)]
    pub yesterday_carbs_grams: f64,
    /// Ambient temperature, `None` when the weather lookup had nothing
    #[serde(default)]
    pub ambient_temp_c: Option<f64>,
    #[serde(default)]
    pub symptom_active: Option<ActiveSymptom>,
    /// Today's meal/workout log, used by the ketone estimator
    #[serde(default)]
    pub intake_log: Vec<IntakeLogEntry>,
    /// Time of yesterday's last meal, used when nothing was eaten today
    #[serde(default)]
    pub yesterday_last_meal_at: Option<DateTime<Utc>>,
}

/// Adaptive daily targets returned to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveTargets {
    pub dynamic_carb_limit_grams: u32,
    pub dynamic_protein_target_grams: u32,
    pub readiness_score: f64,
    pub cns_battery_score: f64,
    pub glycogen_score: f64,
    pub hydration_score: f64,
    pub estimated_ketone_mmol_l: f64,
}

/// Event name repeatedly seen before a symptom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub event_name: String,
    pub event_type: EventType,
    /// Number of distinct episodes the event preceded
    pub occurrences: u32,
    /// Total episodes of the symptom
    pub symptom_episodes: u32,
    pub percentage_of_episodes: u32,
}

/// Recurrence tier of a monthly pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternTier {
    Clue,
    Evidence,
}

impl PatternTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternTier::Clue => "Clue",
            PatternTier::Evidence => "Evidence",
        }
    }
}

/// Recurring event→symptom link within one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPattern {
    pub event_name: String,
    pub event_type: EventType,
    pub symptom_name: String,
    /// Number of distinct symptom dates
    pub count: u32,
    pub symptom_dates: Vec<NaiveDate>,
    pub tier: PatternTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_value_from_json_picks_variant() {
        assert_eq!(
            EventValue::from(json!("espresso")),
            EventValue::Text("espresso".to_string())
        );
        assert_eq!(EventValue::from(json!(42.5)), EventValue::Number(42.5));
        assert_eq!(
            EventValue::from(json!({"grams": 120})).kind(),
            "structured"
        );
    }

    #[test]
    fn test_value_storage_encoding() {
        assert_eq!(EventValue::from("Pizza").to_stored().unwrap(), "Pizza");
        assert_eq!(EventValue::Number(3.0).to_stored().unwrap(), "3");

        let stored = EventValue::from(json!({"ingredients": ["flour"]}))
            .to_stored()
            .unwrap();
        let back = EventValue::from_stored("structured", &stored).unwrap();
        assert_eq!(back.ingredients(), Some(vec!["flour".to_string()]));
    }

    #[test]
    fn test_from_stored_rejects_garbage() {
        assert!(EventValue::from_stored("number", "twelve").is_err());
        assert!(EventValue::from_stored("structured", "{not json").is_err());
        assert!(EventValue::from_stored("blob", "x").is_err());
    }

    #[test]
    fn test_ingredients_skip_empty_and_non_strings() {
        let value = EventValue::from(json!({"ingredients": ["", 3, "  "]}));
        assert_eq!(value.ingredients(), None);

        let value = EventValue::from(json!({"ingredients": [" mozzarella ", 1, "tomato"]}));
        assert_eq!(
            value.ingredients(),
            Some(vec!["mozzarella".to_string(), "tomato".to_string()])
        );

        assert_eq!(EventValue::from("Pizza").ingredients(), None);
    }

    #[test]
    fn test_intensity_clamp() {
        assert_eq!(clamp_intensity(-4), 1);
        assert_eq!(clamp_intensity(7), 7);
        assert_eq!(clamp_intensity(99), 10);
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!(EventType::parse("food"), Some(EventType::Food));
        assert_eq!(EventType::parse("SLEEP"), Some(EventType::Sleep));
        assert_eq!(EventType::parse("meal"), None);
    }

    #[test]
    fn test_severity_factor_normalized() {
        assert_eq!(ActiveSymptom::new("Nausea", 0.0).severity_factor, 0.1);
        assert_eq!(ActiveSymptom::new("Nausea", 1.7).severity_factor, 1.0);
        assert_eq!(ActiveSymptom::new("Nausea", f64::NAN).severity_factor, 1.0);
    }

    #[test]
    fn test_snapshot_defaults_from_sparse_json() {
        let snapshot: DailyBioSnapshot = serde_json::from_value(json!({
            "date": "2024-03-10",
            "ambient_temp_c": 18.0
        }))
        .unwrap();

        assert_eq!(snapshot.steps, 0);
        assert_eq!(snapshot.sleep_hours, None);
        assert!(snapshot.intake_log.is_empty());
    }

    #[test]
    fn test_value_from_input() {
        assert_eq!(
            EventValue::from_input(r#"{"kind":"number","value":2.5}"#),
            EventValue::Number(2.5)
        );
        assert_eq!(
            EventValue::from_input("red wine"),
            EventValue::Text("red wine".to_string())
        );
        assert_eq!(EventValue::from_input("12"), EventValue::Number(12.0));
        assert!(EventValue::from_input(r#"{"ingredients":["egg"]}"#)
            .ingredients()
            .is_some());
    }
}
