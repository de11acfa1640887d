use serde::{Deserialize, Serialize};
use super::data_type::DataType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(name: &str, data_type: DataType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, data_type)
        }
    }
}
