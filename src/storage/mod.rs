/// Store boundary - the capabilities the execution engine consumes from the
/// embedded database.
///
/// A [`Store`] hands out [`StoreConnection`]s. Every execution checks one out
/// for its own lifetime, and a transaction keeps one until it finishes, so an
/// open stream never blocks an unrelated caller.
///
/// Implementations are blocking; the engine calls them from
/// `tokio::task::spawn_blocking`.

pub mod sqlite;

pub use sqlite::{SqliteConnection, SqliteStore};

use std::ops::ControlFlow;
use crate::types::{QueryError, Value};

/// One row as returned by the store, in SELECT-list order.
pub type RawRow = Vec<Value>;

pub trait Store: Send + Sync + 'static {
    type Connection: StoreConnection;

    /// Checks out a connection. Fails with `StoreUnavailable` when the store
    /// cannot be reached or every connection is in use.
    fn acquire(&self) -> Result<Self::Connection, QueryError>;
}

pub trait StoreConnection: Send + 'static {
    /// Runs a query with positional parameters, handing each row to `sink`.
    ///
    /// Stops early when `sink` breaks. The statement and its cursor are
    /// released before returning, on every path.
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
        sink: &mut dyn FnMut(RawRow) -> ControlFlow<()>,
    ) -> Result<(), QueryError>;

    /// Runs a write statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, QueryError>;

    /// Runs several statements without parameters (migrations).
    fn execute_batch(&mut self, sql: &str) -> Result<(), QueryError>;

    /// Starts a write transaction, taking the write lock up front.
    fn begin(&mut self) -> Result<(), QueryError>;

    fn commit(&mut self) -> Result<(), QueryError>;

    fn rollback(&mut self) -> Result<(), QueryError>;
}
