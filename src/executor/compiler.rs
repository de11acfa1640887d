/// Plan -> SQLite text.
///
/// Clause order is fixed: SELECT, FROM, JOINs in declaration order, WHERE
/// (fragments ANDed in declaration order), GROUP BY, ORDER BY, LIMIT/OFFSET.
/// Identifiers are always quoted and qualified, so reserved names such as
/// `order` and columns shared between joined tables need no special casing.

use std::fmt::Write;

use crate::query::reference::quote_identifier;
use crate::query::{
    AggregateExpr, AggregateKind, ColumnRef, JoinKind, OrderTarget, OutputColumn,
    ParameterBinder, QueryPlan, SortOrder, TableScope,
};
use crate::types::{QueryError, Value};

/// Query text ready for the store, with its parameters and output layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub columns: Vec<OutputColumn>,
}

pub struct QueryCompiler;

impl QueryCompiler {
    /// Pure: the same plan always yields the same text and parameters.
    pub fn compile(plan: &QueryPlan) -> Result<CompiledQuery, QueryError> {
        let params = ParameterBinder::bind(plan)?;
        let columns = plan.output_columns();
        if columns.is_empty() {
            return Err(QueryError::Compile("plan selects nothing".to_string()));
        }

        let mut select_list: Vec<String> = plan
            .columns()
            .iter()
            .map(|c| match &c.alias {
                Some(alias) => format!("{} AS {}", Self::column(&c.column), quote_identifier(alias)),
                None => Self::column(&c.column),
            })
            .collect();
        select_list.extend(plan.aggregates().iter().map(Self::aggregate));

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            Self::table(plan.from_scope())
        );

        for join in plan.joins() {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            let _ = write!(
                sql,
                " {keyword} {} ON {} = {}",
                Self::table(&join.target),
                Self::column(&join.on_left),
                Self::column(&join.on_right)
            );
        }

        if !plan.predicates().is_empty() {
            let conditions: Vec<String> = plan
                .predicates()
                .iter()
                .map(|f| format!("({})", f.text))
                .collect();
            let _ = write!(sql, " WHERE {}", conditions.join(" AND "));
        }

        if !plan.group_by().is_empty() {
            let groups: Vec<String> = plan.group_by().iter().map(Self::column).collect();
            let _ = write!(sql, " GROUP BY {}", groups.join(", "));
        }

        if !plan.order_by().is_empty() {
            let orders: Vec<String> = plan
                .order_by()
                .iter()
                .map(|o| {
                    let target = match &o.target {
                        OrderTarget::Column(c) => Self::column(c),
                        OrderTarget::Alias(a) => quote_identifier(a),
                    };
                    let direction = match o.order {
                        SortOrder::Asc => "ASC",
                        SortOrder::Desc => "DESC",
                    };
                    format!("{target} {direction}")
                })
                .collect();
            let _ = write!(sql, " ORDER BY {}", orders.join(", "));
        }

        let _ = match (plan.limit(), plan.offset()) {
            (Some(limit), Some(offset)) => write!(sql, " LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => write!(sql, " LIMIT {limit}"),
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded
            (None, Some(offset)) => write!(sql, " LIMIT -1 OFFSET {offset}"),
            (None, None) => Ok(()),
        };

        Ok(CompiledQuery { sql, params, columns })
    }

    fn column(column: &ColumnRef) -> String {
        format!(
            "{}.{}",
            quote_identifier(&column.scope),
            quote_identifier(&column.column)
        )
    }

    fn table(scope: &TableScope) -> String {
        match &scope.alias {
            Some(alias) => format!("{} AS {}", quote_identifier(&scope.table), quote_identifier(alias)),
            None => quote_identifier(&scope.table),
        }
    }

    fn aggregate(expr: &AggregateExpr) -> String {
        let argument = match expr.kind {
            AggregateKind::CountAll => "*".to_string(),
            AggregateKind::SumOfProduct => expr
                .sources
                .iter()
                .map(Self::column)
                .collect::<Vec<_>>()
                .join(" * "),
            _ => expr.sources.iter().map(Self::column).collect::<Vec<_>>().join(", "),
        };
        format!("{}({argument}) AS {}", expr.kind, quote_identifier(&expr.alias))
    }
}
