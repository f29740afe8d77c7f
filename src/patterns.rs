//! Monthly pattern mining
//!
//! Batch version of the correlation analysis, scoped to one calendar month and run
//! across every symptom at once. Recurrence is measured in distinct symptom dates,
//! so several log entries on the same day never inflate a pattern.
//!
//! Calendar days and months are UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::config::EngineConfig;
use crate::correlation::events_in_window;
use crate::error::ComputeError;
use crate::store::EventStore;
use crate::types::{Event, EventType, MonthlyPattern, PatternTier, SymptomEpisode};

/// Per-group accumulator while scanning a month
#[derive(Default)]
struct PatternAccumulator {
    dates: BTreeSet<NaiveDate>,
    ingredients: Option<Vec<String>>,
}

/// Miner for recurring event→symptom links within a month
#[derive(Debug, Clone)]
pub struct PatternEngine {
    lookback: Duration,
    clue_min_dates: u32,
    evidence_min_dates: u32,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl PatternEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            lookback: config.lookback(),
            clue_min_dates: config.clue_min_dates,
            evidence_min_dates: config.evidence_min_dates,
        }
    }

    /// Tier for a number of distinct symptom dates; `None` below the Clue cut-off
    pub fn tier(&self, count: u32) -> Option<PatternTier> {
        if count >= self.evidence_min_dates {
            Some(PatternTier::Evidence)
        } else if count >= self.clue_min_dates {
            Some(PatternTier::Clue)
        } else {
            None
        }
    }

    /// Mine patterns from the month's episodes and the events preceding them.
    ///
    /// `events` must cover the look-back window of the earliest episode.
    pub fn mine(&self, episodes: &[SymptomEpisode], events: &[Event]) -> Vec<MonthlyPattern> {
        let mut sorted_events: Vec<&Event> = events.iter().collect();
        sorted_events.sort_by_key(|e| e.timestamp);

        let mut sorted_episodes: Vec<&SymptomEpisode> = episodes.iter().collect();
        sorted_episodes.sort_by_key(|e| e.timestamp);

        let mut groups: HashMap<(EventType, &str, &str), PatternAccumulator> = HashMap::new();

        for episode in sorted_episodes {
            let symptom_date = episode.timestamp.date_naive();
            let window = events_in_window(&sorted_events, episode.timestamp, self.lookback);

            for event in window {
                let group = groups
                    .entry((event.event_type, event.name.as_str(), episode.name.as_str()))
                    .or_default();
                group.dates.insert(symptom_date);

                if group.ingredients.is_none() && event.event_type == EventType::Food {
                    group.ingredients = event.value.ingredients();
                }
            }
        }

        let mut patterns: Vec<MonthlyPattern> = groups
            .into_iter()
            .filter_map(|((event_type, event_name, symptom_name), group)| {
                let count = group.dates.len() as u32;
                let tier = self.tier(count)?;
                Some(MonthlyPattern {
                    event_name: event_name.to_string(),
                    event_type,
                    symptom_name: symptom_name.to_string(),
                    count,
                    symptom_dates: group.dates.into_iter().collect(),
                    tier,
                    ingredients: group.ingredients,
                })
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.symptom_name.cmp(&b.symptom_name))
                .then_with(|| a.event_name.cmp(&b.event_name))
                .then_with(|| a.event_type.cmp(&b.event_type))
        });
        patterns
    }

    /// Load a month of episodes plus their look-back events and mine them
    pub fn monthly_patterns(
        &self,
        store: &dyn EventStore,
        year: i32,
        month: u32,
    ) -> Result<Vec<MonthlyPattern>, ComputeError> {
        let (start, end) = month_bounds(year, month)?;

        let episodes = store.symptoms_between(start, end)?;
        if episodes.is_empty() {
            return Ok(Vec::new());
        }

        let from = start.checked_sub_signed(self.lookback).ok_or_else(|| {
            ComputeError::InvalidDate(format!("look-back window before {start} is out of range"))
        })?;
        let events = store.events_between(from, end)?;
        let patterns = self.mine(&episodes, &events);

        log::debug!(
            "{year}-{month:02}: {} pattern(s) from {} episode(s) and {} event(s)",
            patterns.len(),
            episodes.len(),
            events.len()
        );
        Ok(patterns)
    }
}

/// Half-open UTC bounds `[first instant of month, first instant of next month)`
pub fn month_bounds(
    year: i32,
    month: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ComputeError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ComputeError::InvalidDate(format!("{year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ComputeError::InvalidDate(format!("{year}-{month:02}")))?;

    Ok((
        first.and_time(NaiveTime::MIN).and_utc(),
        next.and_time(NaiveTime::MIN).and_utc(),
    ))
}
