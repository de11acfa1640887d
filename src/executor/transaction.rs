/// Scoped unit of work on a dedicated store connection.
///
/// The guard owns the connection from `BEGIN` until it finishes, so its writes
/// stay invisible to other callers until commit. `commit` and `rollback`
/// consume the guard. A guard dropped while still open rolls back on the
/// blocking pool once any stream it opened lets go of the connection.
///
/// A stream opened inside the transaction holds the connection until it is
/// exhausted, closed or dropped. Other steps wait up to the engine's busy
/// timeout for it, then fail with `StoreUnavailable`.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::query::QueryPlan;
use crate::storage::{Store, StoreConnection};
use crate::types::{QueryError, ResultRow, Value};
use super::engine::{first_row, run_blocking, ExecutionEngine};
use super::stream::RowStream;

pub struct Transaction<'e, S: Store> {
    engine: &'e ExecutionEngine<S>,
    conn: Arc<Mutex<S::Connection>>,
    finished: bool,
}

impl<'e, S: Store> Transaction<'e, S> {
    pub(crate) fn new(engine: &'e ExecutionEngine<S>, conn: S::Connection) -> Self {
        Self {
            engine,
            conn: Arc::new(Mutex::new(conn)),
            finished: false,
        }
    }

    async fn claim(&self) -> Result<OwnedMutexGuard<S::Connection>, QueryError> {
        tokio::time::timeout(self.engine.busy_timeout(), Arc::clone(&self.conn).lock_owned())
            .await
            .map_err(|_| {
                QueryError::StoreUnavailable(
                    "transaction connection is held by an open stream".to_string(),
                )
            })
    }

    pub async fn execute(&self, plan: &QueryPlan) -> Result<RowStream, QueryError> {
        let mut conn = self.claim().await?;
        self.engine
            .stream(plan, move |sql, params, sink| conn.query(sql, params, sink))
            .await
    }

    pub async fn execute_one(&self, plan: &QueryPlan) -> Result<Option<ResultRow>, QueryError> {
        let plan = plan.clone().first_only();
        first_row(self.execute(&plan).await?).await
    }

    pub async fn fetch_all(&self, plan: &QueryPlan) -> Result<Vec<ResultRow>, QueryError> {
        self.execute(plan).await?.try_collect().await
    }

    /// Passes a write statement straight to the transaction's connection.
    pub async fn execute_statement(&self, sql: &str, params: Vec<Value>) -> Result<usize, QueryError> {
        let sql = sql.to_string();
        let mut conn = self.claim().await?;
        run_blocking(move || conn.execute(&sql, &params)).await
    }

    /// A failed commit leaves the guard open, so it rolls back on drop.
    pub async fn commit(mut self) -> Result<(), QueryError> {
        let mut conn = self.claim().await?;
        run_blocking(move || conn.commit()).await?;
        self.finished = true;
        info!("transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), QueryError> {
        let mut conn = self.claim().await?;
        self.finished = true;
        run_blocking(move || conn.rollback()).await?;
        info!("transaction rolled back");
        Ok(())
    }
}

impl<S: Store> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("transaction dropped without commit, rolling back");
        let conn = Arc::clone(&self.conn);

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let mut conn = conn.lock_owned().await;
                if let Err(e) = run_blocking(move || conn.rollback()).await {
                    warn!(error = %e, "implicit rollback failed");
                }
            });
            return;
        }

        // Outside a runtime no stream can be pending on the connection. If it
        // is somehow held, the store discards it when the last handle drops.
        match conn.try_lock() {
            Ok(mut conn) => {
                if let Err(e) = conn.rollback() {
                    warn!(error = %e, "implicit rollback failed");
                }
            }
            Err(_) => warn!("transaction connection busy, leaving rollback to the store"),
        }
    }
}
