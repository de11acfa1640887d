use crate::types::{DataType, Value};
use super::reference::count_placeholders;

/// A column resolved against the schema registry.
///
/// Only the builder creates these, so holding one means the scope was in the
/// plan and the column exists in the scope's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Table name or alias the column is reached through
    pub scope: String,
    pub table: String,
    pub column: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnRef {
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.scope, self.column)
    }
}

/// A table participating in a plan, optionally under an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableScope {
    pub table: String,
    pub alias: Option<String>,
}

impl TableScope {
    /// Name columns are qualified with: the alias if any, else the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub column: ColumnRef,
    pub alias: Option<String>,
}

impl SelectedColumn {
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub target: TableScope,
    pub on_left: ColumnRef,
    pub on_right: ColumnRef,
}

/// Raw filter text together with the values for its `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateFragment {
    pub text: String,
    pub params: Vec<Value>,
}

impl PredicateFragment {
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.text)
    }

    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.placeholder_count() == self.params.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    CountAll,
    Sum,
    /// `SUM(a * b)`
    SumOfProduct,
    Avg,
    Min,
    Max,
}

impl AggregateKind {
    /// Number of source columns the aggregate takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::CountAll => 0,
            Self::SumOfProduct => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Count | Self::CountAll => "COUNT",
            Self::Sum | Self::SumOfProduct => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpr {
    pub kind: AggregateKind,
    pub sources: Vec<ColumnRef>,
    pub alias: String,
}

impl AggregateExpr {
    /// Semantic type of the aggregate's result.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self.kind {
            AggregateKind::Count | AggregateKind::CountAll => DataType::Integer,
            AggregateKind::SumOfProduct | AggregateKind::Avg => DataType::Real,
            AggregateKind::Sum | AggregateKind::Min | AggregateKind::Max => self
                .sources
                .first()
                .map_or(DataType::Real, |c| c.data_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTarget {
    Column(ColumnRef),
    /// Output alias of an aggregate
    Alias(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub target: OrderTarget,
    pub order: SortOrder,
}

/// Name and semantic type of one position in the compiled SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub data_type: DataType,
}

/// Immutable, validated retrieval. Built by [`super::QueryBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub(crate) from: TableScope,
    pub(crate) columns: Vec<SelectedColumn>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) predicates: Vec<PredicateFragment>,
    pub(crate) group_by: Vec<ColumnRef>,
    pub(crate) aggregates: Vec<AggregateExpr>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: Option<usize>,
}

impl QueryPlan {
    #[must_use]
    pub const fn from_scope(&self) -> &TableScope {
        &self.from
    }

    #[must_use]
    pub fn columns(&self) -> &[SelectedColumn] {
        &self.columns
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    #[must_use]
    pub fn predicates(&self) -> &[PredicateFragment] {
        &self.predicates
    }

    #[must_use]
    pub fn group_by(&self) -> &[ColumnRef] {
        &self.group_by
    }

    #[must_use]
    pub fn aggregates(&self) -> &[AggregateExpr] {
        &self.aggregates
    }

    #[must_use]
    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Output columns in SELECT order: selected columns, then aggregates.
    #[must_use]
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        self.columns
            .iter()
            .map(|c| OutputColumn {
                name: c.output_name().to_string(),
                data_type: c.column.data_type,
            })
            .chain(self.aggregates.iter().map(|a| OutputColumn {
                name: a.alias.clone(),
                data_type: a.data_type(),
            }))
            .collect()
    }

    /// Caps the row count at one, keeping a stricter existing limit.
    #[must_use]
    pub(crate) fn first_only(mut self) -> Self {
        self.limit = Some(self.limit.map_or(1, |l| l.min(1)));
        self
    }
}
