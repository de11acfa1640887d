/// Query composition: column/table references, plans, the builder that
/// validates them against the schema registry, and parameter binding.

pub mod reference;
pub mod plan;
pub mod builder;
pub mod binder;

pub use plan::{
    AggregateExpr, AggregateKind, ColumnRef, JoinClause, JoinKind, OrderBy, OrderTarget,
    OutputColumn, PredicateFragment, QueryPlan, SelectedColumn, SortOrder, TableScope,
};
pub use builder::QueryBuilder;
pub use binder::ParameterBinder;
