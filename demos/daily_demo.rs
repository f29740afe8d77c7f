//! Walk through a month of journal entries and one day of targets

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;

use metabolic_flux::config::{EngineConfig, Profile};
use metabolic_flux::journal::BioJournal;
use metabolic_flux::pipeline::compute_target_report;
use metabolic_flux::snapshot::{IntakeDay, SensorReading, WeatherReading};
use metabolic_flux::types::{
    DailyBioSnapshot, EventType, IntakeKind, IntakeLogEntry, WorkoutCategory,
};

fn main() {
    let journal = BioJournal::in_memory();
    let pizza = json!({"ingredients": ["flour", "mozzarella", "tomato"]});

    for day in [3, 10, 17] {
        let Some(dinner) = Utc.with_ymd_and_hms(2024, 5, day, 20, 0, 0).single() else {
            continue;
        };
        journal.log_event_at(EventType::Food, "Pizza", pizza.clone(), dinner);
        journal.log_symptom_at("Gonfiore", 6, dinner + Duration::hours(12));
    }

    for result in journal.find_correlations("Gonfiore") {
        println!(
            "{} precedes Gonfiore in {}% of episodes",
            result.event_name, result.percentage_of_episodes
        );
    }
    for pattern in journal.monthly_patterns(2024, 5) {
        println!(
            "[{}] {} -> {} on {} days",
            pattern.tier.as_str(),
            pattern.event_name,
            pattern.symptom_name,
            pattern.count
        );
    }

    let Some(date) = NaiveDate::from_ymd_opt(2024, 5, 18) else {
        return;
    };
    let Some(now) = Utc.with_ymd_and_hms(2024, 5, 18, 19, 0, 0).single() else {
        return;
    };
    let config = EngineConfig::default();
    let sensor = SensorReading {
        steps: 12_400,
        active_energy_kcal: 620.0,
        sleep_hours: Some(6.4),
        heart_rate_variability_ms: Some(54.0),
        last_workout_category: Some(WorkoutCategory::Anaerobic),
    };
    let intake = IntakeDay {
        entries: vec![IntakeLogEntry {
            kind: IntakeKind::Meal,
            logged_at: Some(now - Duration::hours(6)),
            net_carbs_g: 9.0,
        }],
        yesterday_carbs_grams: 18.0,
        yesterday_last_meal_at: None,
    };
    let snapshot = DailyBioSnapshot::assemble(
        date,
        Some(&sensor),
        Some(&WeatherReading {
            ambient_temp_c: 27.0,
        }),
        &Profile::default(),
        &intake,
        &config,
    );

    let report = compute_target_report(&snapshot, &Profile::default(), &config, now);
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
