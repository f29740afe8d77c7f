//! Pipeline orchestration
//!
//! Turns one fully-formed `DailyBioSnapshot` plus the user profile into the day's
//! adaptive targets: carb limiter → protein optimizer → ketone estimator → scores.
//! Every stage is pure, so the same inputs always give the same targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::carbs::{CarbLimit, CarbLimiter};
use crate::config::{EngineConfig, Profile};
use crate::error::ComputeError;
use crate::ketones::{CarbMemory, KetoneEstimator};
use crate::protein::{compute_protein_target, ProteinTarget};
use crate::scores::{sodium_advice, CoachMessage, PhysiologyScores, SodiumAdvice};
use crate::types::{AdaptiveTargets, DailyBioSnapshot};

/// Targets together with the intermediate results behind them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub targets: AdaptiveTargets,
    pub carb_limit: CarbLimit,
    pub protein: ProteinTarget,
    pub scores: PhysiologyScores,
    pub coach: CoachMessage,
    pub coach_text: String,
    pub sodium: SodiumAdvice,
}

/// Compute the day's adaptive targets.
///
/// # Arguments
/// * `snapshot` - Today's assembled inputs
/// * `profile` - Body weight and protocol baselines
/// * `config` - Engine parameters
/// * `now` - Reference time for the fasting clock
pub fn compute_adaptive_targets(
    snapshot: &DailyBioSnapshot,
    profile: &Profile,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> AdaptiveTargets {
    compute_target_report(snapshot, profile, config, now).targets
}

/// Compute targets and keep every intermediate result.
///
/// Stages:
/// 1. CarbLimiter - activity bonuses, safety cap, sleep and symptom penalties
/// 2. Protein optimizer - workout damage and energy buffer over the baseline
/// 3. KetoneEstimator - fasting clock, activity bonus, yesterday's carb memory
/// 4. Scores - readiness, CNS battery, glycogen, hydration, coach and sodium lines
pub fn compute_target_report(
    snapshot: &DailyBioSnapshot,
    profile: &Profile,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> TargetReport {
    let mut snapshot = snapshot.clone();
    if snapshot.symptom_active.is_none() {
        snapshot.symptom_active = profile.active_symptom(snapshot.date);
    }

    // Stage 1: carbohydrate ceiling
    let limiter = CarbLimiter::new(config);
    let inputs = limiter.inputs_for(
        &snapshot,
        profile.base_carbs_g,
        profile.carb_limit_override_g,
    );
    let carb_limit = limiter.compute(&inputs);

    // Stage 2: protein target
    let protein = compute_protein_target(
        profile.body_weight_kg,
        snapshot.last_workout_category,
        snapshot.active_energy_kcal,
        profile.base_protein_g,
    );

    // Stage 3: ketones
    let memory = CarbMemory {
        yesterday_carbs_g: snapshot.yesterday_carbs_grams,
        last_meal_yesterday: snapshot.yesterday_last_meal_at,
    };
    let ketones = KetoneEstimator::new(config).estimate(
        &snapshot.intake_log,
        snapshot.today_carbs_grams,
        snapshot.steps,
        &memory,
        now,
    );

    // Stage 4: scores
    let ambient_temp_c = snapshot.effective_ambient_temp_c(config);
    let scores = PhysiologyScores::compute(
        snapshot.effective_sleep_hours(config),
        snapshot.heart_rate_variability_ms,
        snapshot.active_energy_kcal,
        snapshot.today_carbs_grams,
        ambient_temp_c,
        snapshot.steps,
    );
    let coach = CoachMessage::select(Some(&scores), ambient_temp_c);

    TargetReport {
        targets: AdaptiveTargets {
            dynamic_carb_limit_grams: carb_limit.grams,
            dynamic_protein_target_grams: protein.grams,
            readiness_score: scores.readiness,
            cns_battery_score: scores.cns_battery,
            glycogen_score: scores.glycogen,
            hydration_score: scores.hydration,
            estimated_ketone_mmol_l: ketones,
        },
        carb_limit,
        protein,
        scores,
        coach,
        coach_text: coach.text().to_string(),
        sodium: sodium_advice(ambient_temp_c, snapshot.steps),
    }
}

/// Compute targets from JSON inputs, returning `AdaptiveTargets` as JSON.
///
/// # Example
/// ```ignore
/// let targets_json = targets_from_json(snapshot_json, profile_json, Utc::now())?;
/// ```
pub fn targets_from_json(
    snapshot_json: &str,
    profile_json: &str,
    now: DateTime<Utc>,
) -> Result<String, ComputeError> {
    let snapshot: DailyBioSnapshot = serde_json::from_str(snapshot_json)
        .map_err(|e| ComputeError::ParseError(format!("snapshot: {e}")))?;
    let profile = Profile::from_json(profile_json)?;

    let targets = compute_adaptive_targets(&snapshot, &profile, &EngineConfig::default(), now);
    Ok(serde_json::to_string(&targets)?)
}

/// Stateful processor that memoizes the last report by a caller-supplied version key.
///
/// The caller bumps the key whenever any input changes (new sensor sample, new log
/// entry, profile edit); an unchanged key returns the cached report without
/// recomputing.
pub struct TargetProcessor {
    config: EngineConfig,
    cached: Option<(String, TargetReport)>,
}

impl Default for TargetProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            cached: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load engine configuration from JSON; drops the cached report
    pub fn load_config(&mut self, json: &str) -> Result<(), ComputeError> {
        self.config = EngineConfig::from_json(json)?;
        self.invalidate();
        Ok(())
    }

    /// Save engine configuration to JSON
    pub fn save_config(&self) -> Result<String, ComputeError> {
        self.config
            .to_json()
            .map_err(|e| ComputeError::ConfigError(e.to_string()))
    }

    /// Version key of the cached report, if any
    pub fn cached_version(&self) -> Option<&str> {
        self.cached.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Report for `version_key`, computed only when the key changed
    pub fn report(
        &mut self,
        version_key: &str,
        snapshot: &DailyBioSnapshot,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> TargetReport {
        if let Some((key, report)) = &self.cached {
            if key == version_key {
                return report.clone();
            }
        }

        let report = compute_target_report(snapshot, profile, &self.config, now);
        log::debug!(
            "targets recomputed for version {version_key:?}: carbs {}g, protein {}g",
            report.targets.dynamic_carb_limit_grams,
            report.targets.dynamic_protein_target_grams
        );
        self.cached = Some((version_key.to_string(), report.clone()));
        report
    }

    /// Targets for `version_key`, computed only when the key changed
    pub fn targets(
        &mut self,
        version_key: &str,
        snapshot: &DailyBioSnapshot,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> AdaptiveTargets {
        self.report(version_key, snapshot, profile, now).targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymptomFactorRecord;
    use crate::scores::SodiumLevel;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap()
    }

    fn sample_snapshot_json() -> &'static str {
        r#"{
            "date": "2024-03-10",
            "sleep_hours": 6.5,
            "steps": 9000,
            "active_energy_kcal": 400.0,
            "heart_rate_variability_ms": 60.0,
            "last_workout_category": "anaerobic",
            "today_carbs_grams": 12.0,
            "yesterday_carbs_grams": 0.0,
            "ambient_temp_c": 22.0,
            "intake_log": [
                {"kind": "meal", "logged_at": "2024-03-10T06:00:00Z", "net_carbs_g": 12.0}
            ]
        }"#
    }

    fn sample_profile() -> Profile {
        Profile {
            body_weight_kg: 80.0,
            base_carbs_g: 25.0,
            base_protein_g: 120.0,
            ..Default::default()
        }
    }

    fn sample_snapshot() -> DailyBioSnapshot {
        serde_json::from_str(sample_snapshot_json()).unwrap()
    }

    #[test]
    fn test_compute_adaptive_targets() {
        let report =
            compute_target_report(&sample_snapshot(), &sample_profile(), &EngineConfig::default(), now());
        let targets = &report.targets;

        // (25 + 15 steps + 30 workout) * 0.9 sleep
        assert_eq!(targets.dynamic_carb_limit_grams, 63);
        // 120 + 80 * 0.6 + 1 * 5
        assert_eq!(targets.dynamic_protein_target_grams, 173);
        assert_eq!(targets.readiness_score, 65.625);
        assert_eq!(targets.cns_battery_score, 50.0);
        assert!((targets.glycogen_score - 75.7333).abs() < 1e-3);
        assert_eq!(targets.hydration_score, 91.5);
        // 14h fasted, 12g today: 0.25 + 2 * 0.032 + 0.04 steps
        assert_eq!(targets.estimated_ketone_mmol_l, 0.4);

        assert_eq!(report.coach, CoachMessage::Neutral);
        assert_eq!(report.sodium.level, SodiumLevel::Baseline);
        assert!(report.protein.message.is_some());
    }

    #[test]
    fn test_profile_symptom_record_applies() {
        let mut profile = sample_profile();
        profile.symptom_factor = Some(SymptomFactorRecord::for_today(
            "Bloating",
            sample_snapshot().date,
        ));

        let targets =
            compute_adaptive_targets(&sample_snapshot(), &profile, &EngineConfig::default(), now());
        // 70 * 0.9 * 0.5 = 31.5
        assert_eq!(targets.dynamic_carb_limit_grams, 32);
    }

    #[test]
    fn test_profile_override_wins() {
        let mut profile = sample_profile();
        profile.carb_limit_override_g = Some(40.0);

        let targets =
            compute_adaptive_targets(&sample_snapshot(), &profile, &EngineConfig::default(), now());
        assert_eq!(targets.dynamic_carb_limit_grams, 40);
    }

    #[test]
    fn test_targets_from_json() {
        let profile_json = r#"{"body_weight_kg": 80.0, "base_carbs_g": 25.0, "base_protein_g": 120.0}"#;
        let json = targets_from_json(sample_snapshot_json(), profile_json, now()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dynamic_carb_limit_grams"], 63);
        assert_eq!(value["dynamic_protein_target_grams"], 173);
    }

    #[test]
    fn test_targets_from_json_normalizes_severity_factor() {
        let profile_json = r#"{"body_weight_kg": 80.0, "base_carbs_g": 25.0, "base_protein_g": 120.0}"#;
        let limit_for = |factor: f64| {
            let snapshot_json = serde_json::json!({
                "date": "2024-03-10",
                "steps": 16000,
                "ambient_temp_c": 20.0,
                "symptom_active": {"name": "Headache", "severity_factor": factor}
            })
            .to_string();
            let json = targets_from_json(&snapshot_json, profile_json, now()).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            value["dynamic_carb_limit_grams"].as_u64().unwrap()
        };

        // 25 + 50 steps, capped at 50 without a workout
        assert_eq!(limit_for(3.0), 50);
        assert_eq!(limit_for(-1.0), 5);
    }

    #[test]
    fn test_targets_from_json_without_temperature() {
        let json =
            targets_from_json(r#"{"date":"2024-03-10","steps":4000}"#, "{}", now()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        // Default 20°C: only the steps cost hydration
        assert_eq!(value["hydration_score"], 98.0);
    }

    #[test]
    fn test_targets_from_invalid_json() {
        let result = targets_from_json("not valid json", "{}", now());
        assert!(matches!(result, Err(ComputeError::ParseError(_))));
    }

    #[test]
    fn test_processor_memoizes_by_version() {
        let mut processor = TargetProcessor::new();
        let profile = sample_profile();
        let snapshot = sample_snapshot();

        let first = processor.targets("v1", &snapshot, &profile, now());
        assert_eq!(processor.cached_version(), Some("v1"));

        // Same key: the cached result wins even though the inputs moved
        let mut walked = snapshot.clone();
        walked.steps = 20_000;
        assert_eq!(processor.targets("v1", &walked, &profile, now()), first);

        let second = processor.targets("v2", &walked, &profile, now());
        assert!(second.dynamic_carb_limit_grams > first.dynamic_carb_limit_grams);
        assert_eq!(processor.cached_version(), Some("v2"));
    }

    #[test]
    fn test_processor_config_roundtrip_invalidates() {
        let mut processor = TargetProcessor::new();
        processor.targets("v1", &sample_snapshot(), &sample_profile(), now());

        let saved = processor.save_config().unwrap();
        processor.load_config(&saved).unwrap();

        assert_eq!(processor.cached_version(), None);
        assert_eq!(processor.config(), &EngineConfig::default());
    }
}
