// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod constraints;
pub mod column;
pub mod row;
pub mod table;

// Re-exports for convenience
pub use error::QueryError;
pub use value::Value;
pub use data_type::DataType;
pub use constraints::ForeignKey;
pub use column::ColumnDescriptor;
pub use row::ResultRow;
pub use table::TableDescriptor;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Real(2.5).to_string(), "2.5");
        assert_eq!(Value::Text("hello".to_string()).to_string(), "hello");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        let date = NaiveDate::from_ymd_opt(1996, 7, 4).unwrap();
        assert_eq!(Value::Date(date).to_string(), "1996-07-04");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(42).as_int(), Some(42));
        assert_eq!(Value::Integer(3).as_real(), Some(3.0));
        assert_eq!(Value::Text("hello".to_string()).as_int(), None);
        assert_eq!(Value::Text("hello".to_string()).as_text(), Some("hello"));
        assert_eq!(Value::Boolean(false).as_bool(), Some(false));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("ALFKI")), Value::Text("ALFKI".to_string()));
    }

    #[test]
    fn test_table_descriptor_lookup() {
        let table = TableDescriptor::new(
            "product",
            vec![
                ColumnDescriptor::new("id", DataType::Integer),
                ColumnDescriptor::new("name", DataType::Text),
                ColumnDescriptor::new("supplier_id", DataType::Integer),
            ],
        )
        .with_primary_key("id")
        .with_foreign_key("supplier_id", "supplier", "id");

        assert_eq!(table.get_column_index("name"), Some(1));
        assert_eq!(table.get_column_index("price"), None);
        assert!(table.has_column("supplier_id"));
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert_eq!(table.foreign_keys[0].referenced_table, "supplier");
    }

    #[test]
    fn test_result_row_later_value_overwrites() {
        let mut row = ResultRow::new();
        row.insert("id", Value::Integer(1));
        row.insert("name", Value::Text("Chai".to_string()));
        row.insert("id", Value::Integer(7));

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Integer(7)));
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_result_row_absent() {
        let mut row = ResultRow::new();
        row.insert("e2_id", Value::Null);

        assert!(row.is_absent("e2_id"));
        assert!(row.is_absent("missing"));
        assert!(row.contains("e2_id"));
        assert!(!row.contains("missing"));
    }

    #[test]
    fn test_result_row_serializes_as_object() {
        let mut row = ResultRow::new();
        row.insert("id", Value::Integer(1));
        row.insert("region", Value::Null);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":1,"region":null}"#);
    }

    #[test]
    fn test_error_classification() {
        assert!(QueryError::UnknownTable("x".to_string()).is_schema_error());
        assert!(QueryError::InvalidPlan("x".to_string()).is_plan_error());
        assert!(!QueryError::StoreUnavailable("x".to_string()).is_plan_error());
    }
}
