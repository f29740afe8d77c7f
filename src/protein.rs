//! Protein (nitrogen balance) optimizer
//!
//! Raises the protein target after muscle-damaging work and after meaningful energy
//! expenditure. The configured baseline is a floor: the optimizer never lowers it.

use serde::{Deserialize, Serialize};

use crate::types::WorkoutCategory;

/// Active kcal per block of safety buffer
pub const SAFETY_BUFFER_KCAL_BLOCK: f64 = 300.0;

/// Grams added per full block of active kcal
pub const SAFETY_BUFFER_GRAMS_PER_BLOCK: f64 = 5.0;

/// Protein target with the status line shown next to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinTarget {
    pub grams: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Extra grams per kg of body weight to cover training damage
pub fn damage_per_kg(category: Option<WorkoutCategory>) -> f64 {
    match category {
        Some(WorkoutCategory::Anaerobic) => 0.6,
        Some(WorkoutCategory::AerobicIntense) => 0.3,
        Some(WorkoutCategory::Low) | None => 0.0,
    }
}

/// Headroom earned by energy expenditure, regardless of workout category
pub fn safety_buffer(active_kcal: f64) -> f64 {
    (active_kcal.max(0.0) / SAFETY_BUFFER_KCAL_BLOCK).floor() * SAFETY_BUFFER_GRAMS_PER_BLOCK
}

fn status_message(category: Option<WorkoutCategory>) -> Option<String> {
    match category {
        Some(WorkoutCategory::Anaerobic) => {
            Some("Strength session logged: protein synthesis maximized".to_string())
        }
        Some(WorkoutCategory::AerobicIntense) => {
            Some("Intense cardio logged: anti-catabolic shield active".to_string())
        }
        Some(WorkoutCategory::Low) | None => None,
    }
}

/// Compute the dynamic protein target
pub fn compute_protein_target(
    body_weight_kg: f64,
    last_workout_category: Option<WorkoutCategory>,
    active_kcal: f64,
    base_target_g: f64,
) -> ProteinTarget {
    let base = base_target_g.max(0.0);
    let raw = base
        + body_weight_kg.max(0.0) * damage_per_kg(last_workout_category)
        + safety_buffer(active_kcal);

    ProteinTarget {
        grams: raw.round().max(base.round()) as u32,
        message: status_message(last_workout_category),
    }
}
