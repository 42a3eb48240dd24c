use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use super::{DispatchStatus, NotificationLogEntry};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Filter for querying the notification log
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub order_id: Option<String>,
    pub recipient_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl NotificationFilter {
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

    pub fn with_recipient_id(mut self, recipient_id: impl Into<String>) -> Self {
        self.recipient_id = Some(recipient_id.into());
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
}

/// Append-only record of dispatch calls
pub trait NotificationLogStore: Send + Sync {
    /// Append an entry, returns the assigned ID
    fn insert(&self, entry: &NotificationLogEntry) -> Result<i64, NotifyError>;

    /// Entries newest first
    fn query(&self, filter: &NotificationFilter) -> Result<Vec<NotificationLogEntry>, NotifyError>;
}

/// SQLite-backed notification log
pub struct SqliteNotificationLog {
    conn: Mutex<Connection>,
}

impl SqliteNotificationLog {
    pub fn new(path: &Path) -> Result<Self, NotifyError> {
        let conn = Connection::open(path).map_err(|e| NotifyError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| NotifyError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, NotifyError> {
        let conn =
            Connection::open_in_memory().map_err(|e| NotifyError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), NotifyError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notification_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT,
                recipient_id TEXT,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                status TEXT NOT NULL,
                success_count INTEGER NOT NULL,
                failure_count INTEGER NOT NULL,
                errors TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notification_log_order_id ON notification_log(order_id);
            CREATE INDEX IF NOT EXISTS idx_notification_log_recipient_id ON notification_log(recipient_id);
            "#,
        )
        .map_err(|e| NotifyError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &NotificationFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref order_id) = filter.order_id {
            conditions.push("order_id = ?");
            params.push(Box::new(order_id.clone()));
        }

        if let Some(ref recipient_id) = filter.recipient_id {
            conditions.push("recipient_id = ?");
            params.push(Box::new(recipient_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl NotificationLogStore for SqliteNotificationLog {
    fn insert(&self, entry: &NotificationLogEntry) -> Result<i64, NotifyError> {
        let conn = self.conn.lock().unwrap();

        let errors_json = serde_json::to_string(&entry.errors)
            .map_err(|e| NotifyError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO notification_log (order_id, recipient_id, title, body, status, success_count, failure_count, errors, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.order_id,
                entry.recipient_id,
                entry.title,
                entry.body,
                entry.status.as_str(),
                entry.success_count,
                entry.failure_count,
                errors_json,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| NotifyError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &NotificationFilter) -> Result<Vec<NotificationLogEntry>, NotifyError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id, order_id, recipient_id, title, body, status, success_count, failure_count, errors, created_at FROM notification_log {} ORDER BY id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| NotifyError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_entry)
            .map_err(|e| NotifyError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| NotifyError::Database(e.to_string()))
    }
}

fn conversion_err(idx: usize, e: Box<dyn std::error::Error + Send + Sync>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e)
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<NotificationLogEntry> {
    let status: String = row.get(5)?;
    let errors_json: String = row.get(8)?;
    let created_at: String = row.get(9)?;

    let status: DispatchStatus = status.parse().map_err(|e: String| conversion_err(5, e.into()))?;
    let errors: Vec<String> =
        serde_json::from_str(&errors_json).map_err(|e| conversion_err(8, Box::new(e)))?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_err(9, Box::new(e)))?
        .into();

    Ok(NotificationLogEntry {
        id: row.get(0)?,
        order_id: row.get(1)?,
        recipient_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        status,
        success_count: row.get(6)?,
        failure_count: row.get(7)?,
        errors,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(order_id: Option<&str>, recipient_id: Option<&str>) -> NotificationLogEntry {
        NotificationLogEntry {
            id: 0,
            order_id: order_id.map(String::from),
            recipient_id: recipient_id.map(String::from),
            title: "Your song is ready".to_string(),
            body: "\"Sail Away\" is ready to play.".to_string(),
            status: DispatchStatus::Partial,
            success_count: 1,
            failure_count: 1,
            errors: vec!["endpoint e-2: HTTP 410".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_query() {
        let log = SqliteNotificationLog::in_memory().unwrap();
        let id = log.insert(&entry(Some("o-1"), Some("u-1"))).unwrap();
        assert!(id > 0);

        let entries = log.query(&NotificationFilter::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].status, DispatchStatus::Partial);
        assert_eq!(entries[0].errors, vec!["endpoint e-2: HTTP 410".to_string()]);
    }

    #[test]
    fn test_query_by_order_and_recipient() {
        let log = SqliteNotificationLog::in_memory().unwrap();
        log.insert(&entry(Some("o-1"), Some("u-1"))).unwrap();
        log.insert(&entry(Some("o-2"), Some("u-1"))).unwrap();
        log.insert(&entry(None, None)).unwrap();

        assert_eq!(
            log.query(&NotificationFilter::new().with_order_id("o-1"))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            log.query(&NotificationFilter::new().with_recipient_id("u-1"))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            log.query(&NotificationFilter::new().with_limit(1))
                .unwrap()
                .len(),
            1
        );
    }
}
