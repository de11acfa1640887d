use serde::{Deserialize, Serialize};
use super::column::ColumnDescriptor;
use super::constraints::ForeignKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    /// `None` for link tables such as `order_detail`
    pub primary_key: Option<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDescriptor {
    #[must_use]
    pub fn new(name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_primary_key(mut self, column: &str) -> Self {
        self.primary_key = Some(column.to_string());
        self
    }

    #[must_use]
    pub fn with_foreign_key(mut self, column: &str, referenced_table: &str, referenced_column: &str) -> Self {
        self.foreign_keys
            .push(ForeignKey::new(column, referenced_table, referenced_column));
        self
    }

    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }
}
