//! SQLite-backed order store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::state::OrderTrigger;
use super::store::{
    ApprovalRecord, CreateOrderRequest, OrderError, OrderFilter, OrderStore, SavedLyrics,
    TransitionRecord,
};
use super::types::{
    Lyric, LyricDraft, Order, PaymentStatus, ProductionMetadata, Track, TrackStatus,
};

const ORDER_COLUMNS: &str = "id, owner_id, occasion, style, tone, duration_secs, story, price_cents, status, payment_status, approved_lyric_id, production, created_at, updated_at";

const LYRIC_COLUMNS: &str = "id, order_id, version, title, body, created_at, approved_at";

const TRACK_COLUMNS: &str = "id, order_id, lyric_id, status, created_at, updated_at";

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Create a new SQLite order store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, OrderError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite order store (useful for testing).
    pub fn in_memory() -> Result<Self, OrderError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                occasion TEXT NOT NULL,
                style TEXT NOT NULL,
                tone TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                story TEXT NOT NULL,
                price_cents INTEGER NOT NULL,
                status TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                approved_lyric_id TEXT,
                production TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_owner_id ON orders(owner_id);
            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
            CREATE INDEX IF NOT EXISTS idx_orders_payment_status ON orders(payment_status);

            CREATE TABLE IF NOT EXISTS lyrics (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL REFERENCES orders(id),
                version INTEGER NOT NULL CHECK (version IN (1, 2)),
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                approved_at TEXT,
                UNIQUE (order_id, version)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_lyrics_one_approved
                ON lyrics(order_id) WHERE approved_at IS NOT NULL;

            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL UNIQUE REFERENCES orders(id),
                lyric_id TEXT NOT NULL REFERENCES lyrics(id),
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)
    }

    fn build_where_clause(filter: &OrderFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(payment_status) = filter.payment_status {
            conditions.push("payment_status = ?");
            params.push(Box::new(payment_status.as_str()));
        }

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

fn db_err(e: rusqlite::Error) -> OrderError {
    OrderError::Database(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
    let status: String = row.get(8)?;
    let payment_status: String = row.get(9)?;
    let production_json: Option<String> = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    let production: ProductionMetadata = production_json
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();

    Ok(Order {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        occasion: row.get(2)?,
        style: row.get(3)?,
        tone: row.get(4)?,
        duration_secs: row.get(5)?,
        story: row.get(6)?,
        price_cents: row.get(7)?,
        status: status.parse().map_err(|e| conversion_err(8, e))?,
        payment_status: payment_status.parse().map_err(|e| conversion_err(9, e))?,
        approved_lyric_id: row.get(10)?,
        production,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_lyric(row: &rusqlite::Row) -> rusqlite::Result<Lyric> {
    let created_at: String = row.get(5)?;
    let approved_at: Option<String> = row.get(6)?;

    Ok(Lyric {
        id: row.get(0)?,
        order_id: row.get(1)?,
        version: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        created_at: parse_timestamp(&created_at),
        approved_at: approved_at.as_deref().map(parse_timestamp),
    })
}

fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Track {
        id: row.get(0)?,
        order_id: row.get(1)?,
        lyric_id: row.get(2)?,
        status: status.parse().map_err(|e| conversion_err(3, e))?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn load_order(conn: &Connection, id: &str) -> Result<Option<Order>, OrderError> {
    conn.query_row(
        &format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS),
        params![id],
        row_to_order,
    )
    .optional()
    .map_err(db_err)
}

fn load_lyric(conn: &Connection, id: &str) -> Result<Option<Lyric>, OrderError> {
    conn.query_row(
        &format!("SELECT {} FROM lyrics WHERE id = ?", LYRIC_COLUMNS),
        params![id],
        row_to_lyric,
    )
    .optional()
    .map_err(db_err)
}

fn load_track(conn: &Connection, order_id: &str) -> Result<Option<Track>, OrderError> {
    conn.query_row(
        &format!("SELECT {} FROM tracks WHERE order_id = ?", TRACK_COLUMNS),
        params![order_id],
        row_to_track,
    )
    .optional()
    .map_err(db_err)
}

/// Persist every mutable order column.
fn write_order(conn: &Connection, order: &Order) -> Result<(), OrderError> {
    let production_json = if order.production.is_empty() {
        None
    } else {
        Some(
            serde_json::to_string(&order.production)
                .map_err(|e| OrderError::Database(e.to_string()))?,
        )
    };

    conn.execute(
        "UPDATE orders SET status = ?, payment_status = ?, approved_lyric_id = ?, production = ?, updated_at = ? WHERE id = ?",
        params![
            order.status.as_str(),
            order.payment_status.as_str(),
            order.approved_lyric_id,
            production_json,
            order.updated_at.to_rfc3339(),
            order.id,
        ],
    )
    .map_err(db_err)?;

    Ok(())
}

/// Apply a trigger to a loaded order and persist it when the status changed.
fn fire_trigger(
    conn: &Connection,
    mut order: Order,
    trigger: OrderTrigger,
    now: DateTime<Utc>,
) -> Result<TransitionRecord, OrderError> {
    let from = order.status;
    let transition =
        order
            .apply_trigger(trigger, now)
            .ok_or_else(|| OrderError::InvalidTransition {
                order_id: order.id.clone(),
                from,
                trigger,
            })?;

    if transition.is_changed() {
        write_order(conn, &order)?;
    }

    Ok(TransitionRecord {
        order,
        transition,
        trigger,
    })
}

impl OrderStore for SqliteOrderStore {
    fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let order = Order {
            id,
            owner_id: request.owner_id,
            occasion: request.occasion,
            style: request.style,
            tone: request.tone,
            duration_secs: request.duration_secs,
            story: request.story,
            price_cents: request.price_cents,
            status: super::OrderStatus::Draft,
            payment_status: PaymentStatus::Unpaid,
            approved_lyric_id: None,
            production: ProductionMetadata::default(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            &format!(
                "INSERT INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                ORDER_COLUMNS
            ),
            params![
                order.id,
                order.owner_id,
                order.occasion,
                order.style,
                order.tone,
                order.duration_secs,
                order.story,
                order.price_cents,
                order.status.as_str(),
                order.payment_status.as_str(),
                order.approved_lyric_id,
                Option::<String>::None,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;

        Ok(order)
    }

    fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();
        load_order(&conn, id)
    }

    fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM orders {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            ORDER_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_order)
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM orders {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn apply_trigger(
        &self,
        id: &str,
        trigger: OrderTrigger,
    ) -> Result<TransitionRecord, OrderError> {
        let conn = self.conn.lock().unwrap();

        let order = load_order(&conn, id)?.ok_or_else(|| OrderError::NotFound(id.to_string()))?;
        fire_trigger(&conn, order, trigger, Utc::now())
    }

    fn lyrics_for_order(&self, order_id: &str) -> Result<Vec<Lyric>, OrderError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM lyrics WHERE order_id = ? ORDER BY version ASC",
                LYRIC_COLUMNS
            ))
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![order_id], row_to_lyric)
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn lyric_count(&self, order_id: &str) -> Result<usize, OrderError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lyrics WHERE order_id = ?",
                params![order_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        Ok(count as usize)
    }

    fn get_lyric(&self, lyric_id: &str) -> Result<Option<Lyric>, OrderError> {
        let conn = self.conn.lock().unwrap();
        load_lyric(&conn, lyric_id)
    }

    fn save_lyric_pair(
        &self,
        order_id: &str,
        drafts: &[LyricDraft; 2],
    ) -> Result<SavedLyrics, OrderError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let order = load_order(&tx, order_id)?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        let now = Utc::now();
        let mut lyrics = Vec::with_capacity(drafts.len());

        for (idx, draft) in drafts.iter().enumerate() {
            let lyric = Lyric {
                id: uuid::Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                version: idx as u8 + 1,
                title: draft.title.clone(),
                body: draft.body.clone(),
                created_at: now,
                approved_at: None,
            };

            tx.execute(
                &format!(
                    "INSERT INTO lyrics ({}) VALUES (?, ?, ?, ?, ?, ?, NULL)",
                    LYRIC_COLUMNS
                ),
                params![
                    lyric.id,
                    lyric.order_id,
                    lyric.version,
                    lyric.title,
                    lyric.body,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    OrderError::DuplicateLyrics(order_id.to_string())
                } else {
                    db_err(e)
                }
            })?;

            lyrics.push(lyric);
        }

        let mut transition = fire_trigger(&tx, order, OrderTrigger::LyricsGenerated, now)?;

        // Touch the order even when the status was already LYRICS_GENERATED.
        if !transition.transition.is_changed() {
            transition.order.updated_at = now;
            write_order(&tx, &transition.order)?;
        }

        tx.commit().map_err(db_err)?;

        Ok(SavedLyrics { lyrics, transition })
    }

    fn approve_lyric(
        &self,
        user_id: &str,
        order_id: &str,
        lyric_id: &str,
        production: ProductionMetadata,
    ) -> Result<ApprovalRecord, OrderError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let mut order = load_order(&tx, order_id)?
            .filter(|order| order.owner_id == user_id)
            .ok_or_else(|| OrderError::NotFoundOrForbidden(order_id.to_string()))?;

        let mut lyric = load_lyric(&tx, lyric_id)?
            .filter(|lyric| lyric.order_id == order_id)
            .ok_or_else(|| OrderError::NotFoundOrForbidden(lyric_id.to_string()))?;

        if order.approved_lyric_id.is_some() || load_track(&tx, order_id)?.is_some() {
            return Err(OrderError::AlreadyApproved(order_id.to_string()));
        }

        let now = Utc::now();
        order.approved_lyric_id = Some(lyric.id.clone());
        order.production = production;

        let transition = fire_trigger(&tx, order, OrderTrigger::LyricApproved, now)?;
        if !transition.transition.is_changed() {
            write_order(&tx, &transition.order)?;
        }

        tx.execute(
            "UPDATE lyrics SET approved_at = ? WHERE id = ?",
            params![now.to_rfc3339(), lyric.id],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                OrderError::AlreadyApproved(order_id.to_string())
            } else {
                db_err(e)
            }
        })?;
        lyric.approved_at = Some(now);

        let track = Track {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            lyric_id: lyric.id.clone(),
            status: TrackStatus::Queued,
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            &format!("INSERT INTO tracks ({}) VALUES (?, ?, ?, ?, ?, ?)", TRACK_COLUMNS),
            params![
                track.id,
                track.order_id,
                track.lyric_id,
                track.status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                OrderError::AlreadyApproved(order_id.to_string())
            } else {
                db_err(e)
            }
        })?;

        tx.commit().map_err(db_err)?;

        Ok(ApprovalRecord {
            lyric,
            track,
            transition,
        })
    }

    fn track_for_order(&self, order_id: &str) -> Result<Option<Track>, OrderError> {
        let conn = self.conn.lock().unwrap();
        load_track(&conn, order_id)
    }

    fn list_paid_without_lyrics(&self, limit: i64) -> Result<Vec<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM orders o WHERE o.payment_status = ? AND NOT EXISTS (SELECT 1 FROM lyrics l WHERE l.order_id = o.id) ORDER BY o.updated_at ASC LIMIT ?",
            ORDER_COLUMNS
                .split(", ")
                .map(|c| format!("o.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![PaymentStatus::Paid.as_str(), limit], row_to_order)
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }
}
