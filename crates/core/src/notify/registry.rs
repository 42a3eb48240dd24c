use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::PushEndpoint;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Endpoint not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Registry of push endpoints.
///
/// This is the dispatcher's only view of endpoint storage.
pub trait EndpointRegistry: Send + Sync {
    /// Register `url` for `recipient_id`. Registering a known URL reactivates it
    /// and moves it to the given recipient.
    fn register(&self, recipient_id: &str, url: &str) -> Result<PushEndpoint, RegistryError>;

    /// Active endpoints of one recipient, or of everyone when `None`.
    fn active_endpoints(
        &self,
        recipient_id: Option<&str>,
    ) -> Result<Vec<PushEndpoint>, RegistryError>;

    /// Stop delivering to an endpoint.
    fn deactivate(&self, endpoint_id: &str, reason: &str) -> Result<(), RegistryError>;
}

const ENDPOINT_COLUMNS: &str =
    "id, recipient_id, url, active, created_at, deactivated_at, last_error";

/// SQLite-backed endpoint registry.
pub struct SqliteEndpointRegistry {
    conn: Mutex<Connection>,
}

impl SqliteEndpointRegistry {
    pub fn new(path: &Path) -> Result<Self, RegistryError> {
        let conn = Connection::open(path).map_err(|e| RegistryError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, RegistryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RegistryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RegistryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS push_endpoints (
                id TEXT PRIMARY KEY,
                recipient_id TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                deactivated_at TEXT,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_push_endpoints_recipient ON push_endpoints(recipient_id);
            "#,
        )
        .map_err(|e| RegistryError::Database(e.to_string()))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_endpoint(row: &rusqlite::Row) -> rusqlite::Result<PushEndpoint> {
    let created_at: String = row.get(4)?;
    let deactivated_at: Option<String> = row.get(5)?;

    Ok(PushEndpoint {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        url: row.get(2)?,
        active: row.get(3)?,
        created_at: parse_timestamp(&created_at),
        deactivated_at: deactivated_at.as_deref().map(parse_timestamp),
        last_error: row.get(6)?,
    })
}

impl EndpointRegistry for SqliteEndpointRegistry {
    fn register(&self, recipient_id: &str, url: &str) -> Result<PushEndpoint, RegistryError> {
        let url = url.trim();
        if recipient_id.trim().is_empty() {
            return Err(RegistryError::InvalidEndpoint(
                "recipient_id is required".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RegistryError::InvalidEndpoint(format!(
                "endpoint URL must be http(s): {}",
                url
            )));
        }

        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO push_endpoints (id, recipient_id, url, active, created_at)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(url) DO UPDATE SET
                recipient_id = excluded.recipient_id,
                active = 1,
                deactivated_at = NULL,
                last_error = NULL
            "#,
            params![
                uuid::Uuid::new_v4().to_string(),
                recipient_id,
                url,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| RegistryError::Database(e.to_string()))?;

        conn.query_row(
            &format!("SELECT {} FROM push_endpoints WHERE url = ?", ENDPOINT_COLUMNS),
            params![url],
            row_to_endpoint,
        )
        .map_err(|e| RegistryError::Database(e.to_string()))
    }

    fn active_endpoints(
        &self,
        recipient_id: Option<&str>,
    ) -> Result<Vec<PushEndpoint>, RegistryError> {
        let conn = self.conn.lock().unwrap();

        let (sql, params): (String, Vec<&dyn rusqlite::ToSql>) = match &recipient_id {
            Some(recipient) => (
                format!(
                    "SELECT {} FROM push_endpoints WHERE active = 1 AND recipient_id = ? ORDER BY created_at",
                    ENDPOINT_COLUMNS
                ),
                vec![recipient as &dyn rusqlite::ToSql],
            ),
            None => (
                format!(
                    "SELECT {} FROM push_endpoints WHERE active = 1 ORDER BY created_at",
                    ENDPOINT_COLUMNS
                ),
                Vec::new(),
            ),
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params.as_slice(), row_to_endpoint)
            .map_err(|e| RegistryError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| RegistryError::Database(e.to_string()))
    }

    fn deactivate(&self, endpoint_id: &str, reason: &str) -> Result<(), RegistryError> {
        let conn = self.conn.lock().unwrap();

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM push_endpoints WHERE id = ?",
                params![endpoint_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RegistryError::Database(e.to_string()))?;

        if exists.is_none() {
            return Err(RegistryError::NotFound(endpoint_id.to_string()));
        }

        conn.execute(
            "UPDATE push_endpoints SET active = 0, deactivated_at = ?, last_error = ? WHERE id = ? AND active = 1",
            params![Utc::now().to_rfc3339(), reason, endpoint_id],
        )
        .map_err(|e| RegistryError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_list() {
        let registry = SqliteEndpointRegistry::in_memory().unwrap();

        let endpoint = registry
            .register("user-1", "https://push.example.com/a")
            .unwrap();
        assert!(endpoint.active);
        assert_eq!(endpoint.recipient_id, "user-1");

        registry
            .register("user-2", "https://push.example.com/b")
            .unwrap();

        assert_eq!(registry.active_endpoints(None).unwrap().len(), 2);
        let mine = registry.active_endpoints(Some("user-1")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, endpoint.id);
    }

    #[test]
    fn test_register_is_idempotent_on_url() {
        let registry = SqliteEndpointRegistry::in_memory().unwrap();

        let first = registry
            .register("user-1", "https://push.example.com/a")
            .unwrap();
        let second = registry
            .register("user-1", " https://push.example.com/a ")
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(registry.active_endpoints(None).unwrap().len(), 1);
    }

    #[test]
    fn test_deactivate_hides_endpoint_until_reregistered() {
        let registry = SqliteEndpointRegistry::in_memory().unwrap();
        let endpoint = registry
            .register("user-1", "https://push.example.com/a")
            .unwrap();

        registry.deactivate(&endpoint.id, "HTTP 410").unwrap();
        assert!(registry.active_endpoints(Some("user-1")).unwrap().is_empty());

        let revived = registry
            .register("user-1", "https://push.example.com/a")
            .unwrap();
        assert_eq!(revived.id, endpoint.id);
        assert!(revived.active);
        assert!(revived.last_error.is_none());
    }

    #[test]
    fn test_deactivate_unknown_endpoint() {
        let registry = SqliteEndpointRegistry::in_memory().unwrap();
        let result = registry.deactivate("missing", "gone");
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_register_rejects_non_http_url() {
        let registry = SqliteEndpointRegistry::in_memory().unwrap();
        let result = registry.register("user-1", "ftp://example.com");
        assert!(matches!(result, Err(RegistryError::InvalidEndpoint(_))));
    }
}
