/// Lazy result stream fed by a blocking store task.
///
/// The producer pushes raw rows into a bounded channel and blocks when it is
/// full. Dropping the stream closes the receiver, the producer's next send
/// fails, the store query breaks out of its cursor loop, and the connection is
/// released.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::query::OutputColumn;
use crate::storage::RawRow;
use crate::types::{QueryError, ResultRow};
use super::mapper::ResultMapper;

pub(crate) type RowMessage = Result<RawRow, QueryError>;

pub struct RowStream {
    rx: mpsc::Receiver<RowMessage>,
    columns: Vec<OutputColumn>,
    peeked: Option<RawRow>,
    producer: Option<JoinHandle<()>>,
}

impl RowStream {
    /// Waits for the first message so a failing query errors here rather than
    /// on the first `next()`.
    pub(crate) async fn open(
        mut rx: mpsc::Receiver<RowMessage>,
        columns: Vec<OutputColumn>,
        producer: JoinHandle<()>,
    ) -> Result<Self, QueryError> {
        let peeked = match rx.recv().await {
            Some(Ok(row)) => Some(row),
            Some(Err(e)) => return Err(e),
            None => None,
        };

        let mut stream = Self {
            rx,
            columns,
            peeked,
            producer: Some(producer),
        };
        if stream.peeked.is_none() {
            stream.finish().await?;
        }
        Ok(stream)
    }

    /// Output layout of every row this stream yields.
    #[must_use]
    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    /// Next row, or `None` once the result set is exhausted.
    pub async fn next(&mut self) -> Result<Option<ResultRow>, QueryError> {
        if let Some(raw) = self.peeked.take() {
            return Ok(Some(ResultMapper::map_row(&self.columns, raw)));
        }

        match self.rx.recv().await {
            Some(Ok(raw)) => Ok(Some(ResultMapper::map_row(&self.columns, raw))),
            Some(Err(e)) => Err(e),
            None => {
                self.finish().await?;
                Ok(None)
            }
        }
    }

    /// Drains the remaining rows.
    pub async fn try_collect(mut self) -> Result<Vec<ResultRow>, QueryError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Stops the producer and waits until it has let go of its connection.
    pub async fn close(mut self) -> Result<(), QueryError> {
        self.rx.close();
        self.peeked = None;
        self.finish().await
    }

    /// Surfaces a panicked producer instead of reporting a short result.
    async fn finish(&mut self) -> Result<(), QueryError> {
        if let Some(handle) = self.producer.take() {
            handle
                .await
                .map_err(|e| QueryError::Store(format!("store task failed: {e}")))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("columns", &self.columns)
            .field("finished", &self.producer.is_none())
            .finish_non_exhaustive()
    }
}
