use serde::{Deserialize, Serialize};

/// Semantic column type. SQLite storage classes are narrower than this, so the
/// result mapper uses it to restore dates and booleans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Text,
    Integer,
    Real,
    Date,
    Boolean,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Date => "DATE",
            Self::Boolean => "BOOLEAN",
        };
        f.write_str(name)
    }
}
