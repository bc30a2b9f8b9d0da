//! Database connection manager backed by an r2d2 SQLite pool.

use std::path::{Path, PathBuf};

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use relaybox_domain::constants::DB_BUSY_TIMEOUT;
use relaybox_domain::{DatabaseConfig, RelayError, Result};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");
const MEMORY_PATH: &str = ":memory:";

/// Pooled SQLite connection
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

/// Database manager that owns the connection pool.
pub struct DbManager {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the database file with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path).with_init(apply_connection_pragmas);
        let pool = build_pool(manager, pool_size.max(1))?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlite pool initialised");

        Ok(Self { pool, path })
    }

    /// Private in-memory database.
    ///
    /// The pool holds a single connection so every caller sees the same
    /// database.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(apply_connection_pragmas);
        let pool = build_pool(manager, 1)?;
        Ok(Self { pool, path: PathBuf::from(MEMORY_PATH) })
    }

    /// Open the database described by `config`; `:memory:` selects
    /// [`DbManager::in_memory`].
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.path == MEMORY_PATH {
            warn!("Using an in-memory request store; queued requests will not survive a restart");
            Self::in_memory()
        } else {
            Self::new(&config.path, config.pool_size)
        }
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get().map_err(|e| RelayError::from(InfraError::from(e)))
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)?;
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Perform a health check to verify database connectivity.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}

fn build_pool(
    manager: SqliteConnectionManager,
    max_size: u32,
) -> Result<Pool<SqliteConnectionManager>> {
    Pool::builder().max_size(max_size).build(manager).map_err(|e| {
        warn!(error = %e, "Failed to create connection pool");
        RelayError::from(InfraError::from(e))
    })
}

fn apply_connection_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;\nPRAGMA synchronous=NORMAL;\n")?;
    conn.busy_timeout(DB_BUSY_TIMEOUT)
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> RelayError {
    RelayError::from(InfraError::from(err))
}
