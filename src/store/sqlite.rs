//! SQLite-backed journal

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{format_timestamp, parse_timestamp, schema, EventStore};
use crate::error::ComputeError;
use crate::types::{clamp_intensity, Event, EventType, EventValue, SymptomEpisode};

/// Journal stored in an embedded SQLite database.
///
/// Writes are serialized by SQLite's own transaction model; the mutex only makes
/// the connection shareable across threads.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open (or create) a journal file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self, ComputeError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        schema::create_tables(&conn)?;

        log::info!("event store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory journal
    pub fn open_in_memory() -> Result<Self, ComputeError> {
        let conn = Connection::open_in_memory()?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ComputeError> {
        self.conn
            .lock()
            .map_err(|_| ComputeError::StorageUnavailable("connection lock poisoned".to_string()))
    }

    fn query_events(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Event>, ComputeError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RawEventRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().filter_map(RawEventRow::into_event).collect())
    }

    fn query_symptoms(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<SymptomEpisode>, ComputeError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RawSymptomRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(RawSymptomRow::into_episode)
            .collect())
    }
}

impl EventStore for SqliteEventStore {
    fn append_event(
        &self,
        event_type: EventType,
        name: &str,
        value: &EventValue,
        at: DateTime<Utc>,
    ) -> Result<i64, ComputeError> {
        let stored = value.to_stored()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO events (type, name, value_kind, value, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event_type.as_str(),
                name,
                value.kind(),
                stored,
                format_timestamp(at)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn append_symptom(
        &self,
        name: &str,
        intensity: u8,
        at: DateTime<Utc>,
    ) -> Result<i64, ComputeError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO symptoms (name, intensity, timestamp) VALUES (?1, ?2, ?3)",
            params![name, clamp_intensity(intensity as i64), format_timestamp(at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn symptoms_named(&self, name: &str) -> Result<Vec<SymptomEpisode>, ComputeError> {
        self.query_symptoms(
            "SELECT id, name, intensity, timestamp FROM symptoms
             WHERE name = ?1
             ORDER BY timestamp, id",
            &[&name],
        )
    }

    fn symptoms_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SymptomEpisode>, ComputeError> {
        self.query_symptoms(
            "SELECT id, name, intensity, timestamp FROM symptoms
             WHERE timestamp >= ?1 AND timestamp < ?2
             ORDER BY timestamp, id",
            &[&format_timestamp(from), &format_timestamp(until)],
        )
    }

    fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, ComputeError> {
        self.query_events(
            "SELECT id, type, name, value_kind, value, timestamp FROM events
             WHERE timestamp >= ?1 AND timestamp <= ?2
             ORDER BY timestamp, id",
            &[&format_timestamp(from), &format_timestamp(to)],
        )
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, ComputeError> {
        let limit = limit as i64;
        self.query_events(
            "SELECT id, type, name, value_kind, value, timestamp FROM events
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
            &[&limit],
        )
    }

    fn recent_symptoms(&self, limit: usize) -> Result<Vec<SymptomEpisode>, ComputeError> {
        let limit = limit as i64;
        self.query_symptoms(
            "SELECT id, name, intensity, timestamp FROM symptoms
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
            &[&limit],
        )
    }

    fn distinct_symptom_names(&self) -> Result<Vec<String>, ComputeError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT name FROM symptoms ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

/// Event row exactly as stored, before payload/timestamp parsing
struct RawEventRow {
    id: i64,
    event_type: String,
    name: String,
    value_kind: String,
    value: String,
    timestamp: String,
}

impl RawEventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            event_type: row.get(1)?,
            name: row.get(2)?,
            value_kind: row.get(3)?,
            value: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    /// Malformed rows are skipped rather than failing the whole read
    fn into_event(self) -> Option<Event> {
        let Some(event_type) = EventType::parse(&self.event_type) else {
            log::warn!("skipping event {}: unknown type {:?}", self.id, self.event_type);
            return None;
        };
        let timestamp = match parse_timestamp(&self.timestamp) {
            Ok(ts) => ts,
            Err(e) => {
                log::warn!("skipping event {}: {e}", self.id);
                return None;
            }
        };
        let value = match EventValue::from_stored(&self.value_kind, &self.value) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("event {} payload unreadable, keeping raw text: {e}", self.id);
                EventValue::Text(self.value)
            }
        };

        Some(Event {
            id: self.id,
            event_type,
            name: self.name,
            value,
            timestamp,
        })
    }
}

struct RawSymptomRow {
    id: i64,
    name: String,
    intensity: i64,
    timestamp: String,
}

impl RawSymptomRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            intensity: row.get(2)?,
            timestamp: row.get(3)?,
        })
    }

    fn into_episode(self) -> Option<SymptomEpisode> {
        match parse_timestamp(&self.timestamp) {
            Ok(timestamp) => Some(SymptomEpisode {
                id: self.id,
                name: self.name,
                intensity: clamp_intensity(self.intensity),
                timestamp,
            }),
            Err(e) => {
                log::warn!("skipping symptom {}: {e}", self.id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_append_and_read_event() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        let value = EventValue::from(json!({"ingredients": ["flour", "tomato"]}));

        let id = store
            .append_event(EventType::Food, "Pizza", &value, at(1, 20))
            .unwrap();
        assert!(id > 0);

        let events = store.events_between(at(1, 0), at(2, 0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
        assert_eq!(events[0].event_type, EventType::Food);
        assert_eq!(events[0].value, value);
        assert_eq!(events[0].timestamp, at(1, 20));
    }

    #[test]
    fn test_ids_auto_increment() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        let first = store
            .append_event(EventType::Sleep, "Night", &EventValue::Number(7.5), at(1, 7))
            .unwrap();
        let second = store
            .append_event(EventType::Sleep, "Night", &EventValue::Number(6.0), at(2, 7))
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_symptom_intensity_clamped_on_write() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.append_symptom("Headache", 0, at(1, 9)).unwrap();
        store.append_symptom("Headache", 42, at(2, 9)).unwrap();

        let episodes = store.symptoms_named("Headache").unwrap();
        let intensities: Vec<u8> = episodes.iter().map(|e| e.intensity).collect();
        assert_eq!(intensities, vec![1, 10]);
    }

    #[test]
    fn test_event_range_is_inclusive() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        for hour in [8, 10, 12] {
            store
                .append_event(EventType::Food, "Coffee", &EventValue::from("black"), at(3, hour))
                .unwrap();
        }

        let events = store.events_between(at(3, 8), at(3, 10)).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_symptom_range_excludes_upper_bound() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.append_symptom("Nausea", 5, at(31, 23)).unwrap();
        store.append_symptom("Nausea", 5, at(1, 0)).unwrap();

        let march_first = store.symptoms_between(at(1, 0), at(2, 0)).unwrap();
        assert_eq!(march_first.len(), 1);
        assert_eq!(march_first[0].timestamp, at(1, 0));
    }

    #[test]
    fn test_recent_and_distinct_names() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.append_symptom("Nausea", 3, at(1, 9)).unwrap();
        store.append_symptom("Bloating", 3, at(2, 9)).unwrap();
        store.append_symptom("Nausea", 3, at(3, 9)).unwrap();

        assert_eq!(
            store.distinct_symptom_names().unwrap(),
            vec!["Bloating".to_string(), "Nausea".to_string()]
        );

        let recent = store.recent_symptoms(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(3, 9));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store
            .append_event(EventType::Food, "Bread", &EventValue::from("rye"), at(4, 8))
            .unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "INSERT INTO events (type, name, value_kind, value, timestamp)
                 VALUES ('FOOD', 'Broken', 'text', 'x', '2024-03-04T09:00:00.000Z'),
                        ('MOOD', 'Alien', 'text', 'x', '2024-03-04T10:00:00.000Z'),
                        ('FOOD', 'Corrupt', 'structured', '{oops', '2024-03-04T11:00:00.000Z')",
                [],
            )
            .unwrap();
            conn.execute(
                "UPDATE events SET timestamp = 'yesterday' WHERE name = 'Broken'",
                [],
            )
            .unwrap();
        }

        let events = store.recent_events(10).unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Corrupt", "Bread"]);
        assert_eq!(events[0].value, EventValue::Text("{oops".to_string()));
    }
}
