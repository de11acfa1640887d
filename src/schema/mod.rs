/// Schema registry and the static Northwind metadata it is seeded with.

pub mod registry;
pub mod northwind;

pub use registry::SchemaRegistry;
pub use northwind::northwind;
