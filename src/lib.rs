// northwind-query - typed query composition over an embedded SQLite store
// Modules follow the request path: schema -> query -> executor -> storage

// Clippy configuration - allow non-critical pedantic warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::future_not_send)]
#![allow(clippy::missing_const_for_fn)]

// Core value types and errors
pub mod core;

// Re-export all core types as types module
pub mod types {
    pub use crate::core::*;
}

// Static table metadata (Northwind)
pub mod schema;

// Plan builder, plan types, parameter binding
pub mod query;

// Compilation, streaming execution, result mapping, transactions
pub mod executor;

// Store boundary and the SQLite implementation
pub mod storage;

// Layered runtime configuration
pub mod config;

// Demo query shapes and runner
pub mod workload;

// Re-export commonly used types for convenience
pub use crate::config::AppConfig;
pub use crate::core::{DataType, QueryError, ResultRow, Value};
pub use crate::executor::{CompiledQuery, ExecutionEngine, RowStream, Transaction};
pub use crate::query::{JoinKind, QueryBuilder, QueryPlan, SortOrder};
pub use crate::schema::{northwind, SchemaRegistry};
pub use crate::storage::{SqliteStore, Store, StoreConnection};
