//! Event store
//!
//! The journal of health-relevant events and symptom episodes. Everything that reads
//! or writes the journal goes through the [`EventStore`] trait so callers can swap
//! the SQLite implementation for the lazily-opened or the no-op one.

mod schema;
mod sqlite;

pub use sqlite::SqliteEventStore;

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::ComputeError;
use crate::types::{Event, EventType, EventValue, SymptomEpisode};

/// Append-only journal of events and symptom episodes
pub trait EventStore: Send + Sync {
    /// Append an event and return its id
    fn append_event(
        &self,
        event_type: EventType,
        name: &str,
        value: &EventValue,
        at: DateTime<Utc>,
    ) -> Result<i64, ComputeError>;

    /// Append a symptom episode (intensity clamped to 1-10) and return its id
    fn append_symptom(&self, name: &str, intensity: u8, at: DateTime<Utc>)
        -> Result<i64, ComputeError>;

    /// All episodes of one symptom, oldest first
    fn symptoms_named(&self, name: &str) -> Result<Vec<SymptomEpisode>, ComputeError>;

    /// Episodes with `from <= timestamp < until`, oldest first
    fn symptoms_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SymptomEpisode>, ComputeError>;

    /// Events with `from <= timestamp <= to`, oldest first
    fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, ComputeError>;

    /// Newest events first
    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, ComputeError>;

    /// Newest episodes first
    fn recent_symptoms(&self, limit: usize) -> Result<Vec<SymptomEpisode>, ComputeError>;

    fn distinct_symptom_names(&self) -> Result<Vec<String>, ComputeError>;
}

/// Storage format for timestamps: RFC 3339, UTC, millisecond precision, `Z` suffix.
/// Fixed width, so lexical order is chronological order.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ComputeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ComputeError::ParseError(format!("timestamp {raw:?}: {e}")))
}

/// SQLite journal opened on first use.
///
/// If the first open fails the store stays unavailable for the lifetime of this
/// value: every later call returns [`ComputeError::StorageUnavailable`] without
/// touching the filesystem again.
pub struct LazyEventStore {
    path: PathBuf,
    state: OnceLock<Result<SqliteEventStore, String>>,
}

impl LazyEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the store if needed and report whether it is usable
    pub fn is_available(&self) -> bool {
        self.inner().is_ok()
    }

    fn inner(&self) -> Result<&SqliteEventStore, ComputeError> {
        let state = self.state.get_or_init(|| {
            SqliteEventStore::open(&self.path).map_err(|e| {
                log::warn!(
                    "event store at {} unavailable, persistence disabled: {e}",
                    self.path.display()
                );
                e.to_string()
            })
        });

        state
            .as_ref()
            .map_err(|reason| ComputeError::StorageUnavailable(reason.clone()))
    }
}

impl EventStore for LazyEventStore {
    fn append_event(
        &self,
        event_type: EventType,
        name: &str,
        value: &EventValue,
        at: DateTime<Utc>,
    ) -> Result<i64, ComputeError> {
        self.inner()?.append_event(event_type, name, value, at)
    }

    fn append_symptom(
        &self,
        name: &str,
        intensity: u8,
        at: DateTime<Utc>,
    ) -> Result<i64, ComputeError> {
        self.inner()?.append_symptom(name, intensity, at)
    }

    fn symptoms_named(&self, name: &str) -> Result<Vec<SymptomEpisode>, ComputeError> {
        self.inner()?.symptoms_named(name)
    }

    fn symptoms_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SymptomEpisode>, ComputeError> {
        self.inner()?.symptoms_between(from, until)
    }

    fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, ComputeError> {
        self.inner()?.events_between(from, to)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, ComputeError> {
        self.inner()?.recent_events(limit)
    }

    fn recent_symptoms(&self, limit: usize) -> Result<Vec<SymptomEpisode>, ComputeError> {
        self.inner()?.recent_symptoms(limit)
    }

    fn distinct_symptom_names(&self) -> Result<Vec<String>, ComputeError> {
        self.inner()?.distinct_symptom_names()
    }
}

/// Journal that records nothing: writes return id `0`, reads return nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventStore;

impl EventStore for NoopEventStore {
    fn append_event(
        &self,
        _event_type: EventType,
        _name: &str,
        _value: &EventValue,
        _at: DateTime<Utc>,
    ) -> Result<i64, ComputeError> {
        Ok(0)
    }

    fn append_symptom(
        &self,
        _name: &str,
        _intensity: u8,
        _at: DateTime<Utc>,
    ) -> Result<i64, ComputeError> {
        Ok(0)
    }

    fn symptoms_named(&self, _name: &str) -> Result<Vec<SymptomEpisode>, ComputeError> {
        Ok(Vec::new())
    }

    fn symptoms_between(
        &self,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<SymptomEpisode>, ComputeError> {
        Ok(Vec::new())
    }

    fn events_between(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Event>, ComputeError> {
        Ok(Vec::new())
    }

    fn recent_events(&self, _limit: usize) -> Result<Vec<Event>, ComputeError> {
        Ok(Vec::new())
    }

    fn recent_symptoms(&self, _limit: usize) -> Result<Vec<SymptomEpisode>, ComputeError> {
        Ok(Vec::new())
    }

    fn distinct_symptom_names(&self) -> Result<Vec<String>, ComputeError> {
        Ok(Vec::new())
    }
}
