//! Event log storage.
//!
//! Records are appended in batches and never updated. Queries are either the
//! operator view (filtered, newest first) or the history of one order
//! (oldest first).

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use super::{EventRecord, OrderEvent};

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for EventLogError {
    fn from(e: rusqlite::Error) -> Self {
        EventLogError::Database(e.to_string())
    }
}

/// Filter for the operator view of the event log
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub order_id: Option<String>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        let columns = [
            ("order_id = ?", self.order_id.clone()),
            ("event_type = ?", self.event_type.clone()),
            ("user_id = ?", self.user_id.clone()),
            ("timestamp >= ?", self.from.map(|t| t.to_rfc3339())),
            ("timestamp <= ?", self.to.map(|t| t.to_rfc3339())),
        ];
        for (condition, value) in columns {
            if let Some(value) = value {
                conditions.push(condition);
                params.push(Box::new(value));
            }
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

/// Append-only storage for event records
pub trait EventStore: Send + Sync {
    /// Append records in one transaction: either all are stored or none.
    fn append(&self, records: &[EventRecord]) -> Result<(), EventLogError>;

    /// Records matching the filter, newest first
    fn query(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, EventLogError>;

    /// Count matching records
    fn count(&self, filter: &EventFilter) -> Result<i64, EventLogError>;

    /// Every record about one order, in the order they were written
    fn order_history(&self, order_id: &str) -> Result<Vec<EventRecord>, EventLogError>;
}

const SELECT_COLUMNS: &str = "SELECT id, timestamp, event_type, order_id, user_id, data FROM event_log";

/// SQLite-backed event log
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open (or create) the event log in the given database file
    pub fn new(path: &Path) -> Result<Self, EventLogError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory event log (useful for testing)
    pub fn in_memory() -> Result<Self, EventLogError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), EventLogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS event_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                order_id TEXT,
                user_id TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_event_log_timestamp ON event_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_event_log_order_id ON event_log(order_id, id);
            CREATE INDEX IF NOT EXISTS idx_event_log_event_type ON event_log(event_type);
            "#,
        )?;
        Ok(())
    }

    fn select(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<EventRecord>, EventLogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp, event_type, order_id, user_id, data) = row?;
            records.push(EventRecord {
                id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| EventLogError::Database(format!("Invalid timestamp: {}", e)))?
                    .into(),
                event_type,
                order_id,
                user_id,
                data: serde_json::from_str::<OrderEvent>(&data)
                    .map_err(|e| EventLogError::Serialization(e.to_string()))?,
            });
        }
        Ok(records)
    }
}

impl EventStore for SqliteEventStore {
    fn append(&self, records: &[EventRecord]) -> Result<(), EventLogError> {
        let payloads = records
            .iter()
            .map(|r| serde_json::to_string(&r.data))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EventLogError::Serialization(e.to_string()))?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO event_log (timestamp, event_type, order_id, user_id, data) VALUES (?, ?, ?, ?, ?)",
            )?;
            for (record, data) in records.iter().zip(&payloads) {
                stmt.execute(params![
                    record.timestamp.to_rfc3339(),
                    record.event_type,
                    record.order_id,
                    record.user_id,
                    data,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, EventLogError> {
        let (where_clause, mut params) = filter.where_clause();
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let sql = format!(
            "{} {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        self.select(&sql, &param_refs)
    }

    fn count(&self, filter: &EventFilter) -> Result<i64, EventLogError> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM event_log {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    fn order_history(&self, order_id: &str) -> Result<Vec<EventRecord>, EventLogError> {
        let sql = format!("{} WHERE order_id = ? ORDER BY id ASC", SELECT_COLUMNS);
        self.select(&sql, &[&order_id as &dyn rusqlite::ToSql])
    }
}
