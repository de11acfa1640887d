use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    // Schema errors
    #[error("Table '{0}' not found")]
    UnknownTable(String),
    #[error("Column '{column}' not found in '{scope}'")]
    UnknownColumn { scope: String, column: String },
    #[error("Table '{0}' already exists")]
    DuplicateTable(String),
    #[error("Alias '{0}' is already in use")]
    DuplicateAlias(String),
    #[error("Invalid column definition: {0}")]
    InvalidColumn(String),
    #[error("Column '{column}' is ambiguous between {scopes:?}")]
    AmbiguousColumn { column: String, scopes: Vec<String> },

    // Plan errors
    #[error("Fragment '{fragment}' has {placeholders} placeholder(s) but {params} parameter(s)")]
    ParameterCountMismatch {
        fragment: String,
        placeholders: usize,
        params: usize,
    },
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
    #[error("Compile error: {0}")]
    Compile(String),

    // Execution errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl QueryError {
    /// Caller bugs against the schema. Never worth retrying.
    #[must_use]
    pub const fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTable(_)
                | Self::UnknownColumn { .. }
                | Self::DuplicateTable(_)
                | Self::DuplicateAlias(_)
                | Self::InvalidColumn(_)
                | Self::AmbiguousColumn { .. }
        )
    }

    /// Raised while building or compiling a plan, before any store I/O.
    #[must_use]
    pub const fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Self::ParameterCountMismatch { .. } | Self::InvalidPlan(_) | Self::Compile(_)
        )
    }

    pub(crate) fn unknown_column(scope: &str, column: &str) -> Self {
        Self::UnknownColumn {
            scope: scope.to_string(),
            column: column.to_string(),
        }
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let text = message.clone().unwrap_or_else(|| err.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => Self::ConstraintViolation(text),
                    ErrorCode::CannotOpen
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::NotADatabase
                    | ErrorCode::SystemIoFailure => Self::StoreUnavailable(text),
                    _ => Self::Store(text),
                }
            }
            _ => Self::Store(err.to_string()),
        }
    }
}
