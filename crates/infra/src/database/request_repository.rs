//! SQLite-backed implementation of the request store port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relaybox_core::RequestStore;
use relaybox_domain::{NewRequest, QueuedRequest, RelayError, Result};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::{map_sql_error, DbManager};

/// SQLite request backlog
pub struct SqliteRequestRepository {
    db: Arc<DbManager>,
}

impl SqliteRequestRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_request(conn: &Connection, request: &NewRequest) -> Result<QueuedRequest> {
        let micros = request.created_on.timestamp_micros();
        let created_on = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
            RelayError::InvalidInput(format!("created_on out of range: {}", request.created_on))
        })?;

        conn.execute(INSERT_SQL, params![request.payload, micros]).map_err(map_sql_error)?;

        // Returned as stored so it compares equal to what `load_pending` yields.
        Ok(QueuedRequest { id: conn.last_insert_rowid(), payload: request.payload.clone(), created_on })
    }

    fn fetch_pending(conn: &Connection) -> Result<Vec<QueuedRequest>> {
        let mut stmt = conn.prepare(LOAD_PENDING_SQL).map_err(map_sql_error)?;
        let rows = stmt.query_map([], map_request_row).map_err(map_sql_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<T> {
            let conn = db.get_connection()?;
            op(&*conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl RequestStore for SqliteRequestRepository {
    async fn insert(&self, request: &NewRequest) -> Result<QueuedRequest> {
        let to_insert = request.clone();
        self.with_connection(move |conn| Self::insert_request(conn, &to_insert)).await
    }

    async fn load_pending(&self) -> Result<Vec<QueuedRequest>> {
        self.with_connection(Self::fetch_pending).await
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        self.with_connection(move |conn| {
            let removed = conn.execute(DELETE_SQL, params![id]).map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn pending_count(&self) -> Result<u64> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row(COUNT_SQL, [], |row| row.get(0)).map_err(map_sql_error)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }
}

const INSERT_SQL: &str = "INSERT INTO request_backlog (payload, created_on) VALUES (?1, ?2)";

const LOAD_PENDING_SQL: &str = "SELECT id, payload, created_on
    FROM request_backlog
    ORDER BY created_on ASC, id ASC";

const DELETE_SQL: &str = "DELETE FROM request_backlog WHERE id = ?1";

const COUNT_SQL: &str = "SELECT COUNT(*) FROM request_backlog";

fn map_request_row(row: &Row<'_>) -> rusqlite::Result<QueuedRequest> {
    let micros: i64 = row.get(2)?;
    let created_on = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Integer,
            format!("created_on out of range: {micros}").into(),
        )
    })?;

    Ok(QueuedRequest { id: row.get(0)?, payload: row.get(1)?, created_on })
}

fn map_join_error(err: task::JoinError) -> RelayError {
    if err.is_cancelled() {
        RelayError::Internal("request store task cancelled".into())
    } else {
        RelayError::Internal(format!("request store task panic: {err}"))
    }
}
