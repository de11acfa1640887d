/// Northwind demo workload.
///
/// The plan constructors below are the query shapes the binary runs: full
/// scans, lookups by id, case-insensitive name searches, the employee/manager
/// self-join, product/supplier and order-detail joins, and the per-order
/// summary aggregate. `Workload::run` drives them with ids read from the
/// database and records per-query timings.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::executor::ExecutionEngine;
use crate::query::{QueryBuilder, QueryPlan, SortOrder};
use crate::schema::SchemaRegistry;
use crate::storage::Store;
use crate::types::{QueryError, Value};

pub const SCANNED_TABLES: [&str; 5] = ["customer", "employee", "supplier", "product", "order"];

const MANAGER_COLUMNS: [&str; 15] = [
    "e2.id as e2_id",
    "e2.last_name as e2_last_name",
    "e2.first_name as e2_first_name",
    "e2.title as e2_title",
    "e2.title_of_courtesy as e2_title_of_courtesy",
    "e2.birth_date as e2_birth_date",
    "e2.hire_date as e2_hire_date",
    "e2.address as e2_address",
    "e2.city as e2_city",
    "e2.postal_code as e2_postal_code",
    "e2.country as e2_country",
    "e2.home_phone as e2_home_phone",
    "e2.extension as e2_extension",
    "e2.notes as e2_notes",
    "e2.reports_to as e2_reports_to",
];

pub fn full_scan(registry: &SchemaRegistry, table: &str) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry).select_from(table)?.build()
}

/// Primary-key values of `table`, ascending.
pub fn ids(registry: &SchemaRegistry, table: &str) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry)
        .select_from(table)?
        .select_columns(&["id"])?
        .order_by("id", SortOrder::Asc)?
        .build()
}

/// Lookup by primary key. Works for any table with an `id` column.
pub fn by_id(registry: &SchemaRegistry, table: &str, id: impl Into<Value>) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry)
        .select_from(table)?
        .where_eq("id", id)?
        .build()
}

/// Case-insensitive substring match on `column`.
pub fn search(registry: &SchemaRegistry, table: &str, column: &str, term: &str) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry)
        .select_from(table)?
        .where_contains(column, term)?
        .build()
}

pub fn customer_search(registry: &SchemaRegistry, term: &str) -> Result<QueryPlan, QueryError> {
    search(registry, "customer", "company_name", term)
}

pub fn product_search(registry: &SchemaRegistry, term: &str) -> Result<QueryPlan, QueryError> {
    search(registry, "product", "name", term)
}

/// Employee `id` with their manager's columns under `e2_*`; absent when the
/// employee reports to nobody.
pub fn employee_with_manager(registry: &SchemaRegistry, id: i64) -> Result<QueryPlan, QueryError> {
    let mut columns = vec!["e1.*"];
    columns.extend(MANAGER_COLUMNS);

    QueryBuilder::new(registry)
        .select_from("employee as e1")?
        .left_join("employee as e2", "e1.reports_to", "e2.id")?
        .select_columns(&columns)?
        .where_raw("e1.id = ?", vec![Value::Integer(id)])?
        .build()
}

pub fn product_with_supplier(registry: &SchemaRegistry, id: i64) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry)
        .select_from("product")?
        .left_join("supplier", "supplier.id", "product.supplier_id")?
        .select_columns(&[
            "product.*",
            "supplier.id as s_id",
            "company_name",
            "contact_name",
            "contact_title",
            "address",
            "city",
            "region",
            "postal_code",
            "country",
            "phone",
        ])?
        .where_raw("product.id = ?", vec![Value::Integer(id)])?
        .build()
}

/// One row per order: detail count, total quantity and total price. Orders
/// without details still appear, with a count of zero.
pub fn order_summary(registry: &SchemaRegistry) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry)
        .select_from("order")?
        .left_join("order_detail", "order_detail.order_id", "order.id")?
        .select_columns(&[
            "order.id",
            "order.shipped_date",
            "order.ship_name",
            "order.ship_city",
            "order.ship_country",
        ])?
        .count("product_id as products_count")?
        .sum("quantity as quantity_sum")?
        .sum_product("quantity", "unit_price", "total_price")?
        .group_by(&["order.id"])?
        .order_by("order.id", SortOrder::Asc)?
        .build()
}

pub fn order_details(registry: &SchemaRegistry, order_id: i64) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(registry)
        .select_from("order_detail")?
        .left_join("product", "product.id", "order_detail.product_id")?
        .left_join("order", "order.id", "order_detail.order_id")?
        .select_columns(&[
            "order_detail.*",
            "order.id as o_id",
            "order_date",
            "required_date",
            "shipped_date",
            "ship_via",
            "freight",
            "ship_name",
            "ship_city",
            "ship_region",
            "ship_postal_code",
            "ship_country",
            "customer_id",
            "employee_id",
            "product.id as p_id",
            "name",
            "quantity_per_unit",
            "product.unit_price as p_unit_price",
            "units_in_stock",
            "units_on_order",
            "reorder_level",
            "discontinued",
            "supplier_id",
        ])?
        .where_raw("order_detail.order_id = ?", vec![Value::Integer(order_id)])?
        .build()
}

/// Timing for one named query shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    pub name: String,
    pub runs: usize,
    pub rows: usize,
    pub elapsed: Duration,
}

impl QueryStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: 0,
            rows: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, rows: usize, elapsed: Duration) {
        self.runs += 1;
        self.rows += rows;
        self.elapsed += elapsed;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchTerms {
    pub customers: Vec<String>,
    pub products: Vec<String>,
}

pub struct Workload<'a, S: Store> {
    engine: &'a ExecutionEngine<S>,
    registry: &'a SchemaRegistry,
    stats: Vec<QueryStats>,
}

impl<'a, S: Store> Workload<'a, S> {
    pub const fn new(engine: &'a ExecutionEngine<S>, registry: &'a SchemaRegistry) -> Self {
        Self {
            engine,
            registry,
            stats: Vec::new(),
        }
    }

    /// Runs every query shape once per id / search term.
    pub async fn run(mut self, terms: &SearchTerms) -> Result<Vec<QueryStats>, QueryError> {
        let registry = self.registry;

        for table in SCANNED_TABLES {
            self.fetch(&format!("{table}: full scan"), &full_scan(registry, table)?).await?;
        }

        for id in self.text_ids("customer").await? {
            self.first("customer: by id", &by_id(registry, "customer", id)?).await?;
        }
        for term in &terms.customers {
            self.fetch("customer: search", &customer_search(registry, term)?).await?;
        }

        for id in self.int_ids("employee").await? {
            self.fetch("employee: with manager", &employee_with_manager(registry, id)?).await?;
        }

        for id in self.int_ids("supplier").await? {
            self.first("supplier: by id", &by_id(registry, "supplier", id)?).await?;
        }

        for id in self.int_ids("product").await? {
            self.fetch("product: with supplier", &product_with_supplier(registry, id)?).await?;
        }
        for term in &terms.products {
            self.fetch("product: search", &product_search(registry, term)?).await?;
        }

        self.fetch("order: summary", &order_summary(registry)?).await?;
        for id in self.int_ids("order").await? {
            self.fetch("order: details", &order_details(registry, id)?).await?;
        }

        info!(queries = self.stats.len(), "workload finished");
        Ok(self.stats)
    }

    async fn fetch(&mut self, name: &str, plan: &QueryPlan) -> Result<(), QueryError> {
        let started = Instant::now();
        let rows = self.engine.fetch_all(plan).await?.len();
        self.record(name, rows, started.elapsed());
        Ok(())
    }

    async fn first(&mut self, name: &str, plan: &QueryPlan) -> Result<(), QueryError> {
        let started = Instant::now();
        let rows = usize::from(self.engine.execute_one(plan).await?.is_some());
        self.record(name, rows, started.elapsed());
        Ok(())
    }

    fn record(&mut self, name: &str, rows: usize, elapsed: Duration) {
        debug!(query = name, rows, "query finished");
        let idx = match self.stats.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.stats.push(QueryStats::new(name));
                self.stats.len() - 1
            }
        };
        self.stats[idx].record(rows, elapsed);
    }

    async fn id_values(&self, table: &str) -> Result<Vec<Value>, QueryError> {
        let rows = self.engine.fetch_all(&ids(self.registry, table)?).await?;
        Ok(rows.iter().filter_map(|r| r.get("id").cloned()).collect())
    }

    async fn int_ids(&self, table: &str) -> Result<Vec<i64>, QueryError> {
        Ok(self.id_values(table).await?.iter().filter_map(Value::as_int).collect())
    }

    async fn text_ids(&self, table: &str) -> Result<Vec<String>, QueryError> {
        Ok(self
            .id_values(table)
            .await?
            .iter()
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect())
    }
}
