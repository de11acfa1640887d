/// Static metadata for the six Northwind tables.
///
/// Mirrors the tables created by the migration SQL; the registry never reads
/// the database to discover them.

use crate::types::{ColumnDescriptor as Col, DataType, QueryError, TableDescriptor};
use super::SchemaRegistry;

pub fn customer() -> TableDescriptor {
    TableDescriptor::new(
        "customer",
        vec![
            Col::new("id", DataType::Text),
            Col::new("company_name", DataType::Text),
            Col::new("contact_name", DataType::Text),
            Col::new("contact_title", DataType::Text),
            Col::new("address", DataType::Text),
            Col::new("city", DataType::Text),
            Col::nullable("postal_code", DataType::Text),
            Col::nullable("region", DataType::Text),
            Col::new("country", DataType::Text),
            Col::new("phone", DataType::Text),
            Col::nullable("fax", DataType::Text),
        ],
    )
    .with_primary_key("id")
}

pub fn employee() -> TableDescriptor {
    TableDescriptor::new(
        "employee",
        vec![
            Col::new("id", DataType::Integer),
            Col::new("last_name", DataType::Text),
            Col::new("first_name", DataType::Text),
            Col::new("title", DataType::Text),
            Col::new("title_of_courtesy", DataType::Text),
            Col::new("birth_date", DataType::Date),
            Col::new("hire_date", DataType::Date),
            Col::new("address", DataType::Text),
            Col::new("city", DataType::Text),
            Col::new("postal_code", DataType::Text),
            Col::new("country", DataType::Text),
            Col::new("home_phone", DataType::Text),
            Col::new("extension", DataType::Integer),
            Col::new("notes", DataType::Text),
            Col::nullable("reports_to", DataType::Integer),
        ],
    )
    .with_primary_key("id")
    .with_foreign_key("reports_to", "employee", "id")
}

pub fn order() -> TableDescriptor {
    TableDescriptor::new(
        "order",
        vec![
            Col::new("id", DataType::Integer),
            Col::new("order_date", DataType::Date),
            Col::new("required_date", DataType::Date),
            Col::nullable("shipped_date", DataType::Date),
            Col::new("ship_via", DataType::Integer),
            Col::new("freight", DataType::Real),
            Col::new("ship_name", DataType::Text),
            Col::new("ship_city", DataType::Text),
            Col::nullable("ship_region", DataType::Text),
            Col::nullable("ship_postal_code", DataType::Text),
            Col::new("ship_country", DataType::Text),
            Col::new("customer_id", DataType::Text),
            Col::new("employee_id", DataType::Integer),
        ],
    )
    .with_primary_key("id")
    .with_foreign_key("customer_id", "customer", "id")
    .with_foreign_key("employee_id", "employee", "id")
}

pub fn supplier() -> TableDescriptor {
    TableDescriptor::new(
        "supplier",
        vec![
            Col::new("id", DataType::Integer),
            Col::new("company_name", DataType::Text),
            Col::new("contact_name", DataType::Text),
            Col::new("contact_title", DataType::Text),
            Col::new("address", DataType::Text),
            Col::new("city", DataType::Text),
            Col::nullable("region", DataType::Text),
            Col::new("postal_code", DataType::Text),
            Col::new("country", DataType::Text),
            Col::new("phone", DataType::Text),
        ],
    )
    .with_primary_key("id")
}

pub fn product() -> TableDescriptor {
    TableDescriptor::new(
        "product",
        vec![
            Col::new("id", DataType::Integer),
            Col::new("name", DataType::Text),
            Col::new("quantity_per_unit", DataType::Text),
            Col::new("unit_price", DataType::Real),
            Col::new("units_in_stock", DataType::Integer),
            Col::new("units_on_order", DataType::Integer),
            Col::new("reorder_level", DataType::Integer),
            Col::new("discontinued", DataType::Boolean),
            Col::new("supplier_id", DataType::Integer),
        ],
    )
    .with_primary_key("id")
    .with_foreign_key("supplier_id", "supplier", "id")
}

pub fn order_detail() -> TableDescriptor {
    TableDescriptor::new(
        "order_detail",
        vec![
            Col::new("unit_price", DataType::Real),
            Col::new("quantity", DataType::Integer),
            Col::new("discount", DataType::Real),
            Col::new("order_id", DataType::Integer),
            Col::new("product_id", DataType::Integer),
        ],
    )
    .with_foreign_key("order_id", "order", "id")
    .with_foreign_key("product_id", "product", "id")
}

/// Registry holding all six tables, registered so that every foreign key
/// target exists before the referencing table.
pub fn northwind() -> Result<SchemaRegistry, QueryError> {
    let mut registry = SchemaRegistry::new();
    for table in [customer(), employee(), order(), supplier(), product(), order_detail()] {
        registry.register(table)?;
    }
    Ok(registry)
}
