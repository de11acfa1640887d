/// Execution engine - compiles plans and runs them against a [`Store`].
///
/// All store calls happen on tokio's blocking pool. Every execution checks
/// out its own connection for as long as its stream lives, so an open stream
/// never holds up another query. Reads stream back through a bounded channel
/// sized by `query.stream_buffer`.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::query::QueryPlan;
use crate::storage::{RawRow, Store, StoreConnection};
use crate::types::{QueryError, ResultRow, Value};
use super::compiler::{CompiledQuery, QueryCompiler};
use super::stream::{RowMessage, RowStream};
use super::transaction::Transaction;

const DEFAULT_STREAM_BUFFER: usize = 64;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct ExecutionEngine<S: Store> {
    store: Arc<S>,
    stream_buffer: usize,
    busy_timeout: Duration,
}

impl<S: Store> Clone for ExecutionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            stream_buffer: self.stream_buffer,
            busy_timeout: self.busy_timeout,
        }
    }
}

impl<S: Store> ExecutionEngine<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn from_config(store: S, config: &AppConfig) -> Self {
        Self::new(store)
            .with_stream_buffer(config.query.stream_buffer)
            .with_busy_timeout(Duration::from_millis(config.database.busy_timeout_ms))
    }

    /// Zero is bumped to one; tokio channels need capacity.
    #[must_use]
    pub fn with_stream_buffer(mut self, stream_buffer: usize) -> Self {
        self.stream_buffer = stream_buffer.max(1);
        self
    }

    /// How long a transaction step waits for its connection while a stream
    /// opened in the same transaction still holds it.
    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) const fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn compile(&self, plan: &QueryPlan) -> Result<CompiledQuery, QueryError> {
        QueryCompiler::compile(plan)
    }

    /// Streams the plan's rows. Store errors raised before the first row
    /// (unavailable store, bad SQL) are returned here.
    pub async fn execute(&self, plan: &QueryPlan) -> Result<RowStream, QueryError> {
        let store = Arc::clone(&self.store);
        self.stream(plan, move |sql, params, sink| {
            let mut conn = store.acquire()?;
            conn.query(sql, params, sink)
        })
        .await
    }

    /// First row of the plan with `LIMIT 1` applied, or `None`.
    pub async fn execute_one(&self, plan: &QueryPlan) -> Result<Option<ResultRow>, QueryError> {
        let plan = plan.clone().first_only();
        first_row(self.execute(&plan).await?).await
    }

    pub async fn fetch_all(&self, plan: &QueryPlan) -> Result<Vec<ResultRow>, QueryError> {
        self.execute(plan).await?.try_collect().await
    }

    /// Applies migration SQL through the store's batch entry point.
    pub async fn run_migrations(&self, sql: &str) -> Result<(), QueryError> {
        let sql = sql.to_string();
        self.blocking(move |store| store.acquire()?.execute_batch(&sql)).await?;
        info!("migrations applied");
        Ok(())
    }

    /// Opens a unit of work on a dedicated connection. Its writes stay
    /// invisible to other callers until commit. Dropping the returned guard
    /// without committing rolls it back.
    pub async fn transaction(&self) -> Result<Transaction<'_, S>, QueryError> {
        let conn = self
            .blocking(|store| {
                let mut conn = store.acquire()?;
                conn.begin()?;
                Ok(conn)
            })
            .await?;
        info!("transaction started");
        Ok(Transaction::new(self, conn))
    }

    /// Compiles `plan` and streams it through `run`, which executes the SQL
    /// on some connection from the blocking pool.
    pub(crate) async fn stream<F>(&self, plan: &QueryPlan, run: F) -> Result<RowStream, QueryError>
    where
        F: FnOnce(&str, &[Value], &mut dyn FnMut(RawRow) -> ControlFlow<()>) -> Result<(), QueryError>
            + Send
            + 'static,
    {
        let CompiledQuery { sql, params, columns } = QueryCompiler::compile(plan)?;
        debug!(sql = %sql, params = params.len(), "executing query");

        let (tx, rx) = mpsc::channel::<RowMessage>(self.stream_buffer);
        let producer = tokio::task::spawn_blocking(move || {
            let result = run(&sql, &params, &mut |row| {
                if tx.blocking_send(Ok(row)).is_err() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
            if let Err(e) = result {
                let _ = tx.blocking_send(Err(e));
            }
        });

        RowStream::open(rx, columns, producer).await
    }

    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, QueryError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        run_blocking(move || f(&store)).await
    }
}

/// Runs a store call on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, QueryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, QueryError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QueryError::Store(format!("store task failed: {e}")))?
}

/// Takes the first row and stops the producer before returning, so its
/// connection is free again once this resolves.
pub(crate) async fn first_row(mut stream: RowStream) -> Result<Option<ResultRow>, QueryError> {
    let row = stream.next().await?;
    stream.close().await?;
    Ok(row)
}
