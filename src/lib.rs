//! Metabolic Flux - On-device bio-metabolic inference engine
//!
//! Flux keeps a local journal of meals, workouts, weather and sleep next to
//! self-reported symptoms, mines it for recurring triggers, and turns a day of sensor
//! data into adaptive macro targets: event journal → correlation / monthly patterns,
//! and daily snapshot → carb limiter → protein optimizer → ketone estimate → scores.
//!
//! ## Modules
//!
//! - **Journal**: Failure-tolerant event and symptom log over SQLite
//! - **Analysis**: Symptom correlations and monthly Clue/Evidence patterns
//! - **Targets**: Carb ceiling, protein target, ketone estimate and readiness scores

pub mod carbs;
pub mod config;
pub mod correlation;
pub mod error;
pub mod journal;
pub mod ketones;
pub mod patterns;
pub mod pipeline;
pub mod protein;
pub mod scores;
pub mod snapshot;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{EngineConfig, Profile, SymptomFactorRecord};
pub use error::ComputeError;
pub use journal::BioJournal;
pub use pipeline::{compute_adaptive_targets, compute_target_report, TargetProcessor};

// Store exports
pub use store::{EventStore, LazyEventStore, NoopEventStore, SqliteEventStore};

// Data model exports
pub use types::{
    AdaptiveTargets, CorrelationResult, DailyBioSnapshot, Event, EventType, EventValue,
    MonthlyPattern, PatternTier, SymptomEpisode, WorkoutCategory,
};

/// Flux version reported by the CLI and the C ABI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "metabolic-flux";
