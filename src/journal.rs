//! Symptom journal facade
//!
//! `BioJournal` is what the UI talks to. It never fails: a write the store could not
//! take returns id `0`, a read it could not serve returns an empty list, and the
//! reason is logged at `warn`. Callers should read `0`/empty as "possibly not
//! persisted" rather than "definitely empty".

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::correlation::CorrelationAnalyzer;
use crate::error::ComputeError;
use crate::patterns::PatternEngine;
use crate::store::{EventStore, LazyEventStore, NoopEventStore, SqliteEventStore};
use crate::types::{
    clamp_intensity, CorrelationResult, Event, EventType, EventValue, MonthlyPattern,
    SymptomEpisode,
};

/// Failure-tolerant journal over any [`EventStore`]
pub struct BioJournal {
    store: Box<dyn EventStore>,
    analyzer: CorrelationAnalyzer,
    patterns: PatternEngine,
}

impl BioJournal {
    /// Journal backed by the SQLite file at `path`, opened on first use
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_store(Box::new(LazyEventStore::new(path)))
    }

    /// Journal kept in memory; falls back to a disabled journal if SQLite cannot start
    pub fn in_memory() -> Self {
        match SqliteEventStore::open_in_memory() {
            Ok(store) => Self::with_store(Box::new(store)),
            Err(e) => {
                log::warn!("in-memory event store unavailable, persistence disabled: {e}");
                Self::disabled()
            }
        }
    }

    /// Journal that records nothing
    pub fn disabled() -> Self {
        Self::with_store(Box::new(NoopEventStore))
    }

    pub fn with_store(store: Box<dyn EventStore>) -> Self {
        Self::with_store_and_config(store, &EngineConfig::default())
    }

    pub fn with_store_and_config(store: Box<dyn EventStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            analyzer: CorrelationAnalyzer::new(config),
            patterns: PatternEngine::new(config),
        }
    }

    /// Use a different window and thresholds for the analyzers
    pub fn configure(&mut self, config: &EngineConfig) {
        self.analyzer = CorrelationAnalyzer::new(config);
        self.patterns = PatternEngine::new(config);
    }

    pub fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// Record an event now; returns its id, or `0` if it was not recorded
    pub fn log_event(
        &self,
        event_type: EventType,
        name: &str,
        value: impl Into<EventValue>,
    ) -> i64 {
        self.log_event_at(event_type, name, value, Utc::now())
    }

    /// Record an event with an explicit (possibly backdated) timestamp
    pub fn log_event_at(
        &self,
        event_type: EventType,
        name: &str,
        value: impl Into<EventValue>,
        at: DateTime<Utc>,
    ) -> i64 {
        let value = value.into();
        or_default(
            "log_event",
            self.store.append_event(event_type, name, &value, at),
        )
    }

    /// Record a symptom now; intensity is clamped to 1-10
    pub fn log_symptom(&self, name: &str, intensity: i64) -> i64 {
        self.log_symptom_at(name, intensity, Utc::now())
    }

    pub fn log_symptom_at(&self, name: &str, intensity: i64, at: DateTime<Utc>) -> i64 {
        or_default(
            "log_symptom",
            self.store.append_symptom(name, clamp_intensity(intensity), at),
        )
    }

    /// Events that keep preceding `symptom_name`
    pub fn find_correlations(&self, symptom_name: &str) -> Vec<CorrelationResult> {
        or_default(
            "find_correlations",
            self.analyzer.find_correlations(self.store.as_ref(), symptom_name),
        )
    }

    /// Recurring event→symptom links within one calendar month
    pub fn monthly_patterns(&self, year: i32, month: u32) -> Vec<MonthlyPattern> {
        or_default(
            "monthly_patterns",
            self.patterns.monthly_patterns(self.store.as_ref(), year, month),
        )
    }

    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        or_default("recent_events", self.store.recent_events(limit))
    }

    pub fn recent_symptoms(&self, limit: usize) -> Vec<SymptomEpisode> {
        or_default("recent_symptoms", self.store.recent_symptoms(limit))
    }

    pub fn symptom_names(&self) -> Vec<String> {
        or_default("symptom_names", self.store.distinct_symptom_names())
    }
}

fn or_default<T: Default>(operation: &str, result: Result<T, ComputeError>) -> T {
    result.unwrap_or_else(|e| {
        log::warn!("{operation} failed: {e}");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternTier;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const UNOPENABLE: &str = "/nonexistent-metabolic-flux-dir/nested/journal.db";

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_log_and_correlate() {
        let journal = BioJournal::in_memory();
        for day in [2, 9, 16] {
            let id = journal.log_event_at(EventType::Food, "Wine", "red", at(day, 21));
            assert!(id > 0);
            journal.log_symptom_at("Headache", 6, at(day + 1, 7));
        }
        journal.log_symptom_at("Headache", 3, at(25, 7));

        let results = journal.find_correlations("Headache");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_name, "Wine");
        assert_eq!(results[0].occurrences, 3);
        assert_eq!(results[0].percentage_of_episodes, 75);
    }

    #[test]
    fn test_monthly_patterns_through_journal() {
        let journal = BioJournal::in_memory();
        let pizza = json!({"ingredients": ["flour", "tomato"]});
        for day in [4, 11] {
            journal.log_event_at(EventType::Food, "Pizza", pizza.clone(), at(day, 20));
            journal.log_symptom_at("Gonfiore", 5, at(day, 23));
        }

        let patterns = journal.monthly_patterns(2024, 5);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].tier, PatternTier::Clue);
        assert_eq!(
            patterns[0].ingredients,
            Some(vec!["flour".to_string(), "tomato".to_string()])
        );

        assert!(journal.monthly_patterns(2024, 13).is_empty());
    }

    #[test]
    fn test_symptom_intensity_is_clamped() {
        let journal = BioJournal::in_memory();
        journal.log_symptom_at("Cramps", 42, at(3, 9));
        journal.log_symptom_at("Cramps", -7, at(3, 10));

        let intensities: Vec<u8> = journal
            .recent_symptoms(10)
            .iter()
            .map(|s| s.intensity)
            .collect();
        assert_eq!(intensities, vec![1, 10]);
        assert_eq!(journal.symptom_names(), vec!["Cramps".to_string()]);
    }

    #[test]
    fn test_log_event_now() {
        let journal = BioJournal::in_memory();
        let before = Utc::now() - Duration::seconds(1);
        let id = journal.log_event(EventType::Workout, "Deadlift", 140.0);
        assert!(id > 0);

        let events = journal.recent_events(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, EventValue::Number(140.0));
        assert!(events[0].timestamp >= before);
    }

    #[test]
    fn test_unavailable_store_degrades_to_defaults() {
        let journal = BioJournal::open(UNOPENABLE);

        assert_eq!(journal.log_event(EventType::Food, "Wine", "red"), 0);
        assert_eq!(journal.log_symptom("Headache", 5), 0);
        assert!(journal.find_correlations("Headache").is_empty());
        assert!(journal.monthly_patterns(2024, 5).is_empty());
        assert!(journal.recent_events(5).is_empty());
        assert!(journal.symptom_names().is_empty());
    }

    #[test]
    fn test_disabled_journal() {
        let journal = BioJournal::disabled();
        assert_eq!(journal.log_symptom("Nausea", 4), 0);
        assert!(journal.recent_symptoms(5).is_empty());
    }

    #[test]
    fn test_oversized_window_does_not_panic() {
        let config = EngineConfig {
            lookback_hours: i64::MAX,
            ..Default::default()
        };
        let store = SqliteEventStore::open_in_memory().unwrap();
        let journal = BioJournal::with_store_and_config(Box::new(store), &config);
        journal.log_event_at(EventType::Food, "Wine", "", at(1, 20));
        journal.log_symptom_at("Nausea", 6, at(20, 8));

        // Clamped to a year, so the event three weeks back still counts
        assert_eq!(journal.find_correlations("Nausea").len(), 1);
        assert_eq!(journal.monthly_patterns(2024, 5).len(), 0);
    }

    #[test]
    fn test_configure_changes_window() {
        let mut journal = BioJournal::in_memory();
        journal.log_event_at(EventType::Food, "Shellfish", "", at(8, 12));
        journal.log_symptom_at("Nausea", 7, at(10, 10));
        assert!(journal.find_correlations("Nausea").is_empty());

        journal.configure(&EngineConfig {
            lookback_hours: 48,
            ..Default::default()
        });
        assert_eq!(journal.find_correlations("Nausea").len(), 1);
    }
}
