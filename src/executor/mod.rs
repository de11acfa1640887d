/// Executor module - turns validated plans into rows.
///
/// Structure:
/// - compiler: plan -> SQL text + ordered parameters
/// - engine: runs compiled queries on the store's blocking pool
/// - stream: lazy row stream over a bounded channel
/// - mapper: raw store values -> typed result rows
/// - transaction: scoped unit of work with rollback on drop

pub mod compiler;
pub mod engine;
pub mod mapper;
pub mod stream;
pub mod transaction;

pub use compiler::{CompiledQuery, QueryCompiler};
pub use engine::ExecutionEngine;
pub use mapper::ResultMapper;
pub use stream::RowStream;
pub use transaction::Transaction;
