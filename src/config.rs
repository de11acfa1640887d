/// Runtime configuration.
///
/// Priority: explicit file (or `./northwind-query.toml` if present) <
/// `NORTHWIND_*` environment variables. CLI flags are applied on top by the
/// binary. Nested keys use `__`, e.g. `NORTHWIND_DATABASE__PATH=:memory:`.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use crate::types::QueryError;

pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Upper bound on pooled connections; each open stream holds one
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// SQL applied once after opening the store
    #[serde(default)]
    pub migrations: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Rows buffered between the store task and a `RowStream`
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_path() -> String { "datapack/_sqlite.db".to_string() }
fn default_busy_timeout_ms() -> u64 { 5000 }
fn default_max_connections() -> usize { 8 }
fn default_stream_buffer() -> usize { 64 }
fn default_level() -> String { "info".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_connections: default_max_connections(),
            migrations: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }
}

impl AppConfig {
    pub fn load(file: Option<&Path>) -> Result<Self, QueryError> {
        let mut builder = Config::builder();

        builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("northwind-query").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("NORTHWIND")
                .prefix_separator("_")
                .separator("__"),
        );

        let loaded = builder.build()?.try_deserialize::<Self>()?;
        if loaded.query.stream_buffer == 0 {
            return Err(QueryError::Config(config::ConfigError::Message(
                "query.stream_buffer must be at least 1".to_string(),
            )));
        }
        if loaded.database.max_connections == 0 {
            return Err(QueryError::Config(config::ConfigError::Message(
                "database.max_connections must be at least 1".to_string(),
            )));
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_source() {
        let config = Config::builder()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();

        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.query.stream_buffer, 64);
        assert_eq!(config.log.level, "info");
        assert!(config.database.migrations.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\npath = \":memory:\"\nmigrations = \"drizzle/0000_init.sql\"\n\n[query]\nstream_buffer = 8"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert!(config.database.is_in_memory());
        assert_eq!(config.database.migrations, Some(PathBuf::from("drizzle/0000_init.sql")));
        assert_eq!(config.query.stream_buffer, 8);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_zero_stream_buffer_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[query]\nstream_buffer = 0").unwrap();

        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[database]\nmax_connections = 0").unwrap();

        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(QueryError::Config(_))
        ));
    }
}
