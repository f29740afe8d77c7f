//! Correlation analysis
//!
//! For one symptom, finds the events that keep showing up in the look-back window
//! before its episodes. Counting is per distinct episode: an event logged ten times
//! before the same episode still counts once, so volume cannot stand in for
//! repetition across days.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::store::EventStore;
use crate::types::{CorrelationResult, Event, EventType, SymptomEpisode};

/// Events in `[at - lookback, at]`, given events sorted by timestamp
pub(crate) fn events_in_window<'s, 'e>(
    sorted: &'s [&'e Event],
    at: DateTime<Utc>,
    lookback: Duration,
) -> &'s [&'e Event] {
    let from = at
        .checked_sub_signed(lookback)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let start = sorted.partition_point(|e| e.timestamp < from);
    let end = sorted.partition_point(|e| e.timestamp <= at);
    &sorted[start..end.max(start)]
}

/// Analyzer for event→symptom co-occurrence
#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    lookback: Duration,
    threshold_ratio: f64,
}

impl Default for CorrelationAnalyzer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CorrelationAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            lookback: config.lookback(),
            threshold_ratio: config.correlation_threshold_ratio,
        }
    }

    /// Minimum number of distinct episodes an event must precede
    pub fn threshold(&self, total_episodes: usize) -> u32 {
        ((total_episodes as f64 * self.threshold_ratio).ceil() as u32).max(1)
    }

    /// Correlate episodes of a single symptom against journal events.
    ///
    /// Results are sorted by occurrences (descending), then by event name.
    pub fn correlate(
        &self,
        episodes: &[SymptomEpisode],
        events: &[Event],
    ) -> Vec<CorrelationResult> {
        let total_episodes = episodes.len();
        if total_episodes == 0 {
            return Vec::new();
        }
        let threshold = self.threshold(total_episodes);

        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by_key(|e| e.timestamp);

        let mut counts: HashMap<(EventType, &str), u32> = HashMap::new();
        for episode in episodes {
            let seen: HashSet<(EventType, &str)> = self
                .window(&sorted, episode.timestamp)
                .iter()
                .map(|e| (e.event_type, e.name.as_str()))
                .collect();

            for key in seen {
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut results: Vec<CorrelationResult> = counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|((event_type, name), count)| CorrelationResult {
                event_name: name.to_string(),
                event_type,
                occurrences: count,
                symptom_episodes: total_episodes as u32,
                percentage_of_episodes: percentage(count, total_episodes),
            })
            .collect();

        results.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.event_name.cmp(&b.event_name))
                .then_with(|| a.event_type.cmp(&b.event_type))
        });
        results
    }

    /// Load a symptom's episodes and the events around them, then correlate
    pub fn find_correlations(
        &self,
        store: &dyn EventStore,
        symptom_name: &str,
    ) -> Result<Vec<CorrelationResult>, ComputeError> {
        let episodes = store.symptoms_named(symptom_name)?;

        let (Some(first), Some(last)) = (
            episodes.iter().map(|e| e.timestamp).min(),
            episodes.iter().map(|e| e.timestamp).max(),
        ) else {
            return Ok(Vec::new());
        };

        let from = first.checked_sub_signed(self.lookback).ok_or_else(|| {
            ComputeError::InvalidDate(format!("look-back window before {first} is out of range"))
        })?;
        let events = store.events_between(from, last)?;
        let results = self.correlate(&episodes, &events);

        log::debug!(
            "{} correlation(s) for {symptom_name:?} over {} episode(s)",
            results.len(),
            episodes.len()
        );
        Ok(results)
    }

    pub(crate) fn window<'s, 'e>(
        &self,
        sorted: &'s [&'e Event],
        at: DateTime<Utc>,
    ) -> &'s [&'e Event] {
        events_in_window(sorted, at, self.lookback)
    }
}

fn percentage(count: u32, total: usize) -> u32 {
    (count as f64 / total as f64 * 100.0).round() as u32
}
