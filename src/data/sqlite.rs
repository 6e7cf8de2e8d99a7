//! SQLite-backed event store
//!
//! Reference adapter for applications that persist their event log in a
//! local SQLite file. Schema is created on first open; timestamps are
//! stored as RFC 3339 TEXT so rows stay inspectable with the sqlite3
//! shell.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::core::types::{DateRange, Event, EventKind};

use super::store::EventStore;

/// Event log in a local SQLite database
pub struct SqliteEventStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteEventStore {
    /// Create or open the database at `path`
    pub fn new(path: &str) -> Result<Self> {
        let exists = Path::new(path).exists();
        let conn = rusqlite::Connection::open(path)?;
        if !exists {
            init_schema(&conn)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, handy for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append an event (application-side write path)
    pub fn log_event(&self, user_id: &str, event: &Event) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (user_id, kind, item_id, timestamp, severity, portion, meal_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                event.kind.as_str(),
                event.item_id,
                event.timestamp.to_rfc3339(),
                event.severity,
                event.portion,
                event.meal_id,
            ],
        )?;
        Ok(())
    }

    pub fn event_count(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE events (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            item_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            severity REAL,
            portion TEXT,
            meal_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_events_lookup
         ON events (user_id, kind, timestamp)",
        [],
    )?;
    Ok(())
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn events(
        &self,
        user_id: &str,
        kind: EventKind,
        item_id: Option<&str>,
        range: &DateRange,
    ) -> Result<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, item_id, timestamp, severity, portion, meal_id
             FROM events
             WHERE user_id = ?1 AND kind = ?2
               AND timestamp >= ?3 AND timestamp < ?4
               AND (?5 IS NULL OR item_id = ?5)
             ORDER BY timestamp",
        )?;

        let rows = stmt.query_map(
            params![
                user_id,
                kind.as_str(),
                range.start.to_rfc3339(),
                range.end.to_rfc3339(),
                item_id,
            ],
            |row| {
                let kind_str: String = row.get(0)?;
                let item: String = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let severity: Option<f64> = row.get(3)?;
                let portion: Option<String> = row.get(4)?;
                let meal_id: Option<String> = row.get(5)?;
                Ok((kind_str, item, timestamp, severity, portion, meal_id))
            },
        )?;

        let mut events = Vec::new();
        for row in rows {
            let (kind_str, item, timestamp, severity, portion, meal_id) = row?;
            let Some(kind) = EventKind::from_str(&kind_str) else {
                continue;
            };
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)?.with_timezone(&Utc);
            events.push(Event {
                timestamp,
                kind,
                item_id: item,
                severity,
                portion,
                meal_id,
            });
        }
        Ok(events)
    }
}
