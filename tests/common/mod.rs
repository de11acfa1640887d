#![allow(dead_code)]

use std::ops::Deref;

use northwind_query::{northwind, ExecutionEngine, SchemaRegistry, SqliteStore};
use tempfile::TempDir;

pub const FIXTURE: &str = include_str!("../fixtures/northwind.sql");

/// Fixture database in a temporary directory, removed on drop.
pub struct Fixture {
    engine: ExecutionEngine<SqliteStore>,
    _dir: TempDir,
}

impl Deref for Fixture {
    type Target = ExecutionEngine<SqliteStore>;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

pub async fn engine() -> Fixture {
    engine_with_buffer(64).await
}

pub async fn engine_with_buffer(stream_buffer: usize) -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteStore::open(dir.path().join("northwind.db")).expect("open store");
    let engine = ExecutionEngine::new(store).with_stream_buffer(stream_buffer);
    engine.run_migrations(FIXTURE).await.expect("apply fixture");
    Fixture { engine, _dir: dir }
}

/// In-memory store seeded with the fixture.
pub async fn memory_engine(stream_buffer: usize) -> ExecutionEngine<SqliteStore> {
    let store = SqliteStore::open_in_memory().expect("open in-memory store");
    let engine = ExecutionEngine::new(store).with_stream_buffer(stream_buffer);
    engine.run_migrations(FIXTURE).await.expect("apply fixture");
    engine
}

pub fn registry() -> SchemaRegistry {
    northwind().expect("northwind registry")
}
