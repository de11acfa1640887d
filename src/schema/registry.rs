use std::collections::HashMap;
use crate::types::{QueryError, TableDescriptor};

/// Process-lifetime catalog of table descriptors.
///
/// Populated once at startup, then shared read-only (typically behind an `Arc`).
/// Nothing hands out mutable access to a registered descriptor.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableDescriptor>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table.
    ///
    /// Foreign keys must point at an already registered table, or at the table
    /// itself (`employee.reports_to -> employee.id`).
    pub fn register(&mut self, table: TableDescriptor) -> Result<(), QueryError> {
        if self.by_name.contains_key(&table.name) {
            return Err(QueryError::DuplicateTable(table.name));
        }

        if let Some(pk) = &table.primary_key {
            if !table.has_column(pk) {
                return Err(QueryError::InvalidColumn(format!(
                    "primary key '{pk}' is not a column of '{}'",
                    table.name
                )));
            }
        }

        for fk in &table.foreign_keys {
            if !table.has_column(&fk.column) {
                return Err(QueryError::InvalidColumn(format!(
                    "foreign key column '{}' is not a column of '{}'",
                    fk.column, table.name
                )));
            }

            let target = if fk.referenced_table == table.name {
                Some(&table)
            } else {
                self.get(&fk.referenced_table)
            };

            match target {
                Some(t) if t.has_column(&fk.referenced_column) => {}
                Some(_) => {
                    return Err(QueryError::InvalidColumn(format!(
                        "{}.{} references unknown column {}.{}",
                        table.name, fk.column, fk.referenced_table, fk.referenced_column
                    )));
                }
                None => {
                    return Err(QueryError::InvalidColumn(format!(
                        "{}.{} references unknown table '{}'",
                        table.name, fk.column, fk.referenced_table
                    )));
                }
            }
        }

        self.by_name.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&TableDescriptor, QueryError> {
        self.get(name)
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableDescriptor> {
        self.by_name.get(name).map(|&idx| &self.tables[idx])
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
