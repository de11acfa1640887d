use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::types::{QueryError, Value};
use super::{RawRow, Store, StoreConnection};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;

/// Distinguishes in-memory databases opened by the same process
static MEMORY_DATABASES: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
enum Target {
    File(PathBuf),
    /// Shared-cache URI, so every pooled connection sees the same database
    Memory(String),
}

struct PoolState {
    idle: Vec<Connection>,
    /// Connections handed out or idle, not counting the anchor
    open: usize,
}

struct Pool {
    target: Target,
    busy_timeout: Duration,
    max_connections: usize,
    state: Mutex<PoolState>,
    /// Keeps an in-memory database alive while no connection is checked out
    _anchor: Option<Mutex<Connection>>,
}

impl Pool {
    fn lock(&self) -> Result<MutexGuard<'_, PoolState>, QueryError> {
        self.state
            .lock()
            .map_err(|_| QueryError::StoreUnavailable("connection pool mutex poisoned".to_string()))
    }

    fn connect(&self) -> Result<Connection, QueryError> {
        let conn = match &self.target {
            Target::File(path) => Connection::open(path)?,
            Target::Memory(uri) => {
                Connection::open_with_flags(uri, OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI)?
            }
        };
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;

        // Readers keep seeing the last committed state while a writer is open
        if let Target::File(_) = self.target {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(mode = %mode, "journal mode set");
        }
        Ok(conn)
    }

    fn checkout(&self) -> Result<Connection, QueryError> {
        let mut state = self.lock()?;
        if let Some(conn) = state.idle.pop() {
            return Ok(conn);
        }
        if state.open >= self.max_connections {
            return Err(QueryError::StoreUnavailable(format!(
                "all {} connections are in use",
                self.max_connections
            )));
        }
        state.open += 1;
        drop(state);

        match self.connect() {
            Ok(conn) => {
                debug!(database = ?self.target, "opened pooled connection");
                Ok(conn)
            }
            Err(e) => {
                if let Ok(mut state) = self.state.lock() {
                    state.open -= 1;
                }
                Err(e)
            }
        }
    }

    fn release(&self, conn: Connection) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if conn.is_autocommit() {
            state.idle.push(conn);
        } else {
            // Closing the connection rolls its transaction back
            state.open = state.open.saturating_sub(1);
            drop(state);
            warn!("discarding connection returned inside a transaction");
            drop(conn);
        }
    }
}

/// Pool of `rusqlite` connections to one database.
///
/// Connections are opened on demand up to `max_connections` and reused once
/// returned. File databases run in WAL mode. In-memory databases use a shared
/// cache; there a read that touches a table with uncommitted writes fails with
/// `StoreUnavailable` instead of waiting.
pub struct SqliteStore {
    pool: Arc<Pool>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        Self::build(
            Target::File(path.as_ref().to_path_buf()),
            DEFAULT_BUSY_TIMEOUT,
            DEFAULT_MAX_CONNECTIONS,
        )
    }

    pub fn open_in_memory() -> Result<Self, QueryError> {
        Self::build(memory_target(), DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS)
    }

    /// Opens the configured database and applies the configured migrations.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, QueryError> {
        let target = if config.is_in_memory() {
            memory_target()
        } else {
            Target::File(PathBuf::from(&config.path))
        };
        let store = Self::build(
            target,
            Duration::from_millis(config.busy_timeout_ms),
            config.max_connections.max(1),
        )?;

        if let Some(migrations) = &config.migrations {
            let sql = std::fs::read_to_string(migrations)?;
            store.acquire()?.execute_batch(&sql)?;
            info!(file = %migrations.display(), "applied migrations");
        }

        Ok(store)
    }

    fn build(target: Target, busy_timeout: Duration, max_connections: usize) -> Result<Self, QueryError> {
        let anchor = match &target {
            Target::Memory(uri) => Some(Mutex::new(Connection::open_with_flags(
                uri,
                OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
            )?)),
            Target::File(_) => None,
        };
        let pool = Pool {
            target,
            busy_timeout,
            max_connections,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
            }),
            _anchor: anchor,
        };

        // The first connection is opened eagerly so a bad path fails here
        let first = pool.checkout()?;
        pool.release(first);
        debug!(database = ?pool.target, max_connections, "opened sqlite store");

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Connections currently open, idle or checked out.
    pub fn open_connections(&self) -> usize {
        self.pool.state.lock().map_or(0, |state| state.open)
    }
}

fn memory_target() -> Target {
    let n = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
    Target::Memory(format!(
        "file:northwind-{}-{n}?mode=memory&cache=shared",
        std::process::id()
    ))
}

impl Store for SqliteStore {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection, QueryError> {
        let conn = self.pool.checkout()?;
        Ok(SqliteConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
        })
    }
}

/// A connection checked out of a [`SqliteStore`]; returned to the pool on drop.
pub struct SqliteConnection {
    conn: Option<Connection>,
    pool: Arc<Pool>,
}

impl SqliteConnection {
    fn conn(&self) -> Result<&Connection, QueryError> {
        self.conn
            .as_ref()
            .ok_or_else(|| QueryError::StoreUnavailable("connection already released".to_string()))
    }
}

impl StoreConnection for SqliteConnection {
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
        sink: &mut dyn FnMut(RawRow) -> ControlFlow<()>,
    ) -> Result<(), QueryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(from_sql(row.get::<_, SqlValue>(idx)?));
            }
            if sink(values).is_break() {
                break;
            }
        }

        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, QueryError> {
        Ok(self.conn()?.execute(sql, params_from_iter(params.iter()))?)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), QueryError> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), QueryError> {
        self.execute_batch("BEGIN IMMEDIATE")
    }

    fn commit(&mut self) -> Result<(), QueryError> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), QueryError> {
        self.execute_batch("ROLLBACK")
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Self::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
            Self::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(r) => Value::Real(r),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SUPPLIERS: &str = "CREATE TABLE supplier (id INTEGER PRIMARY KEY, company_name TEXT NOT NULL);
         INSERT INTO supplier VALUES (1, 'Exotic Liquids'), (2, 'Tokyo Traders'), (3, 'Pavlova, Ltd.');";

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.acquire().unwrap().execute_batch(SUPPLIERS).unwrap();
        store
    }

    fn collect(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Vec<RawRow> {
        let mut rows = Vec::new();
        conn.query(sql, params, &mut |row| {
            rows.push(row);
            ControlFlow::Continue(())
        })
        .unwrap();
        rows
    }

    fn config(path: String, max_connections: usize) -> DatabaseConfig {
        DatabaseConfig {
            path,
            busy_timeout_ms: 100,
            max_connections,
            migrations: None,
        }
    }

    #[test]
    fn test_query_binds_positional_params() {
        let store = store_with_table();
        let rows = collect(
            &mut store.acquire().unwrap(),
            "SELECT id, company_name FROM supplier WHERE id > ? AND company_name LIKE ? ORDER BY id",
            &[Value::Integer(1), Value::from("%a%")],
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::Integer(2), Value::from("Tokyo Traders")]);
    }

    #[test]
    fn test_query_stops_when_sink_breaks() {
        let store = store_with_table();
        let mut conn = store.acquire().unwrap();
        let mut seen = 0;
        conn.query("SELECT id FROM supplier ORDER BY id", &[], &mut |_| {
            seen += 1;
            ControlFlow::Break(())
        })
        .unwrap();
        assert_eq!(seen, 1);

        // Connection is usable again once the cursor is gone
        assert_eq!(collect(&mut conn, "SELECT id FROM supplier", &[]).len(), 3);
    }

    #[test]
    fn test_text_param_is_not_interpolated() {
        let store = store_with_table();
        let rows = collect(
            &mut store.acquire().unwrap(),
            "SELECT id FROM supplier WHERE company_name = ?",
            &[Value::from("x' OR '1'='1")],
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_boolean_and_date_params() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut conn = store.acquire().unwrap();
        conn.execute_batch("CREATE TABLE t (flag INTEGER, day TEXT)").unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(1996, 7, 4).unwrap();
        conn.execute("INSERT INTO t VALUES (?, ?)", &[Value::Boolean(true), Value::Date(date)])
            .unwrap();

        let rows = collect(&mut conn, "SELECT flag, day FROM t", &[]);
        assert_eq!(rows[0], vec![Value::Integer(1), Value::from("1996-07-04")]);
    }

    #[test]
    fn test_constraint_violation_surfaces() {
        let store = store_with_table();
        let err = store
            .acquire()
            .unwrap()
            .execute("INSERT INTO supplier VALUES (?, ?)", &[Value::Integer(1), Value::from("Dup")])
            .unwrap_err();
        assert!(matches!(err, QueryError::ConstraintViolation(_)));
    }

    #[test]
    fn test_syntax_error_is_store_error() {
        let store = store_with_table();
        let err = store
            .acquire()
            .unwrap()
            .query("SELEC id FROM supplier", &[], &mut |_| ControlFlow::Continue(()));
        assert!(matches!(err, Err(QueryError::Store(_))));
    }

    #[test]
    fn test_open_missing_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let result = SqliteStore::open(dir.path().join("missing").join("northwind.db"));
        assert!(matches!(result, Err(QueryError::StoreUnavailable(_))));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let store = store_with_table();
        let mut conn = store.acquire().unwrap();
        conn.begin().unwrap();
        conn.execute("DELETE FROM supplier WHERE id = ?", &[Value::Integer(1)])
            .unwrap();
        conn.rollback().unwrap();

        assert_eq!(collect(&mut conn, "SELECT id FROM supplier", &[]).len(), 3);
    }

    #[test]
    fn test_from_config_applies_migrations() {
        let dir = TempDir::new().unwrap();
        let migrations = dir.path().join("0000_init.sql");
        std::fs::write(&migrations, "CREATE TABLE region (id INTEGER PRIMARY KEY); INSERT INTO region VALUES (1);").unwrap();

        let mut config = config(dir.path().join("northwind.db").display().to_string(), 4);
        config.migrations = Some(migrations);
        let store = SqliteStore::from_config(&config).unwrap();
        assert_eq!(collect(&mut store.acquire().unwrap(), "SELECT id FROM region", &[]).len(), 1);
    }

    #[test]
    fn test_nested_read_while_cursor_open() {
        let store = store_with_table();
        let mut outer = store.acquire().unwrap();
        let mut inner_rows = 0;

        outer
            .query("SELECT id FROM supplier ORDER BY id", &[], &mut |_| {
                let mut inner = store.acquire().unwrap();
                inner_rows += collect(&mut inner, "SELECT id FROM supplier WHERE id = ?", &[Value::Integer(2)]).len();
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(inner_rows, 3);
        assert_eq!(store.open_connections(), 2);
    }

    #[test]
    fn test_released_connection_is_reused() {
        let store = store_with_table();
        for _ in 0..5 {
            let mut conn = store.acquire().unwrap();
            assert_eq!(collect(&mut conn, "SELECT id FROM supplier", &[]).len(), 3);
        }
        assert_eq!(store.open_connections(), 1);
    }

    #[test]
    fn test_exhausted_pool_is_unavailable() {
        let store = SqliteStore::from_config(&config(":memory:".to_string(), 1)).unwrap();
        let held = store.acquire().unwrap();

        assert!(matches!(store.acquire(), Err(QueryError::StoreUnavailable(_))));
        drop(held);
        assert!(store.acquire().is_ok());
    }

    #[test]
    fn test_in_memory_stores_are_separate() {
        let first = store_with_table();
        let second = SqliteStore::open_in_memory().unwrap();
        let err = second
            .acquire()
            .unwrap()
            .query("SELECT id FROM supplier", &[], &mut |_| ControlFlow::Continue(()));

        assert!(matches!(err, Err(QueryError::Store(_))));
        assert_eq!(collect(&mut first.acquire().unwrap(), "SELECT id FROM supplier", &[]).len(), 3);
    }

    #[test]
    fn test_file_reader_sees_committed_state_during_write() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::from_config(&config(dir.path().join("northwind.db").display().to_string(), 4)).unwrap();
        store.acquire().unwrap().execute_batch(SUPPLIERS).unwrap();

        let mut writer = store.acquire().unwrap();
        writer.begin().unwrap();
        writer.execute("DELETE FROM supplier WHERE id = ?", &[Value::Integer(1)]).unwrap();

        let mut reader = store.acquire().unwrap();
        assert_eq!(collect(&mut reader, "SELECT id FROM supplier", &[]).len(), 3);

        writer.commit().unwrap();
        assert_eq!(collect(&mut reader, "SELECT id FROM supplier", &[]).len(), 2);
    }

    #[test]
    fn test_second_writer_is_unavailable_not_store_error() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::from_config(&config(dir.path().join("northwind.db").display().to_string(), 4)).unwrap();
        store.acquire().unwrap().execute_batch(SUPPLIERS).unwrap();

        let mut first = store.acquire().unwrap();
        first.begin().unwrap();

        let mut second = store.acquire().unwrap();
        assert!(matches!(second.begin(), Err(QueryError::StoreUnavailable(_))));

        first.rollback().unwrap();
        assert!(second.begin().is_ok());
        second.rollback().unwrap();
    }

    #[test]
    fn test_connection_dropped_inside_transaction_is_discarded() {
        let store = store_with_table();
        {
            let mut conn = store.acquire().unwrap();
            conn.begin().unwrap();
            conn.execute("DELETE FROM supplier", &[]).unwrap();
        }

        assert_eq!(store.open_connections(), 0);
        assert_eq!(collect(&mut store.acquire().unwrap(), "SELECT id FROM supplier", &[]).len(), 3);
    }
}
