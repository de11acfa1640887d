/// Fluent construction of [`QueryPlan`]s.
///
/// Every call validates against the schema registry immediately and returns
/// `Err` on the first problem, so a builder that made it to `build()` only
/// holds resolved references. Tables and aliases enter the scope through
/// `select_from` and `join`; columns can only be referenced once their scope
/// is present.

use crate::schema::SchemaRegistry;
use crate::types::{QueryError, TableDescriptor, Value};
use super::plan::{
    AggregateExpr, AggregateKind, ColumnRef, JoinClause, JoinKind, OrderBy, OrderTarget,
    PredicateFragment, QueryPlan, SelectedColumn, SortOrder, TableScope,
};
use super::reference::{
    check_placeholder_style, count_placeholders, escape_like, parse_column_spec, parse_table_spec,
    quote_identifier, ColumnName,
};

pub struct QueryBuilder<'r> {
    registry: &'r SchemaRegistry,
    from: Option<TableScope>,
    /// Scope name -> table, primary table first, then joins in order
    scopes: Vec<(String, &'r TableDescriptor)>,
    columns: Vec<SelectedColumn>,
    joins: Vec<JoinClause>,
    predicates: Vec<PredicateFragment>,
    group_by: Vec<ColumnRef>,
    aggregates: Vec<AggregateExpr>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl<'r> QueryBuilder<'r> {
    #[must_use]
    pub const fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            from: None,
            scopes: Vec::new(),
            columns: Vec::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            group_by: Vec::new(),
            aggregates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Sets the primary table: `"customer"` or `"employee as e1"`.
    pub fn select_from(mut self, table: &str) -> Result<Self, QueryError> {
        if self.from.is_some() {
            return Err(QueryError::InvalidPlan(
                "primary table is already set".to_string(),
            ));
        }

        let spec = parse_table_spec(table)?;
        let descriptor = self.registry.lookup(&spec.table)?;
        let scope = TableScope {
            table: spec.table,
            alias: spec.alias,
        };
        self.scopes.push((scope.name().to_string(), descriptor));
        self.from = Some(scope);
        Ok(self)
    }

    /// Adds output columns. Accepts `col`, `scope.col`, `[scope.]col as alias`
    /// and `[scope.]*`.
    pub fn select_columns(mut self, specs: &[&str]) -> Result<Self, QueryError> {
        self.require_from()?;

        for raw in specs {
            let spec = parse_column_spec(raw)?;
            match spec.column {
                ColumnName::Star => {
                    if spec.alias.is_some() {
                        return Err(QueryError::InvalidPlan(format!(
                            "'{raw}': a wildcard cannot be aliased"
                        )));
                    }
                    let scope = spec
                        .qualifier
                        .unwrap_or_else(|| self.scopes[0].0.clone());
                    let table = self
                        .scope_table(&scope)
                        .ok_or_else(|| QueryError::UnknownTable(scope.clone()))?;
                    for col in &table.columns {
                        self.push_column(SelectedColumn {
                            column: Self::column_ref(&scope, table, &col.name)?,
                            alias: None,
                        })?;
                    }
                }
                ColumnName::Named(name) => {
                    let column = self.resolve(spec.qualifier.as_deref(), &name)?;
                    self.push_column(SelectedColumn {
                        column,
                        alias: spec.alias,
                    })?;
                }
            }
        }

        Ok(self)
    }

    /// Joins `table` (under `alias` if given) on `on_left = on_right`.
    ///
    /// One side of the condition must belong to the joined table and the other
    /// to a table already in the query, in either order.
    pub fn join(
        mut self,
        kind: JoinKind,
        table: &str,
        alias: Option<&str>,
        on_left: &str,
        on_right: &str,
    ) -> Result<Self, QueryError> {
        self.require_from()?;

        let descriptor = self.registry.lookup(table)?;
        let name = alias.unwrap_or(table);
        if self.scope_table(name).is_some() {
            return Err(QueryError::DuplicateAlias(name.to_string()));
        }
        self.scopes.push((name.to_string(), descriptor));

        let left = self.resolve_plain(on_left)?;
        let right = self.resolve_plain(on_right)?;
        if (left.scope == name) == (right.scope == name) {
            return Err(QueryError::InvalidPlan(format!(
                "join condition {} = {} must relate '{name}' to a table already in the query",
                left.qualified_name(),
                right.qualified_name()
            )));
        }

        self.joins.push(JoinClause {
            kind,
            target: TableScope {
                table: table.to_string(),
                alias: alias.map(str::to_string),
            },
            on_left: left,
            on_right: right,
        });
        Ok(self)
    }

    /// `join(Inner, ..)` taking a `"table [as alias]"` spec.
    pub fn inner_join(self, table: &str, on_left: &str, on_right: &str) -> Result<Self, QueryError> {
        let spec = parse_table_spec(table)?;
        self.join(JoinKind::Inner, &spec.table, spec.alias.as_deref(), on_left, on_right)
    }

    /// `join(Left, ..)` taking a `"table [as alias]"` spec.
    pub fn left_join(self, table: &str, on_left: &str, on_right: &str) -> Result<Self, QueryError> {
        let spec = parse_table_spec(table)?;
        self.join(JoinKind::Left, &spec.table, spec.alias.as_deref(), on_left, on_right)
    }

    /// Adds a raw predicate. The text is kept verbatim; `params` fill its `?`
    /// placeholders left to right. Numbered and named placeholders are
    /// rejected.
    pub fn where_raw(mut self, fragment: &str, params: Vec<Value>) -> Result<Self, QueryError> {
        self.require_from()?;

        if fragment.trim().is_empty() {
            return Err(QueryError::InvalidPlan("empty predicate".to_string()));
        }
        check_placeholder_style(fragment)?;

        let placeholders = count_placeholders(fragment);
        if placeholders != params.len() {
            return Err(QueryError::ParameterCountMismatch {
                fragment: fragment.to_string(),
                placeholders,
                params: params.len(),
            });
        }

        self.predicates.push(PredicateFragment {
            text: fragment.to_string(),
            params,
        });
        Ok(self)
    }

    /// Equality predicate on a resolved column.
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.require_from()?;

        let column = self.resolve_plain(column)?;
        self.predicates.push(PredicateFragment {
            text: format!(
                "{}.{} = ?",
                quote_identifier(&column.scope),
                quote_identifier(&column.column)
            ),
            params: vec![value.into()],
        });
        Ok(self)
    }

    /// Case-insensitive substring match on a resolved column. LIKE wildcards
    /// in `term` match literally.
    pub fn where_contains(mut self, column: &str, term: &str) -> Result<Self, QueryError> {
        self.require_from()?;

        let column = self.resolve_plain(column)?;
        self.predicates.push(PredicateFragment {
            text: format!(
                "LOWER({}.{}) LIKE ? ESCAPE '\\'",
                quote_identifier(&column.scope),
                quote_identifier(&column.column)
            ),
            params: vec![Value::Text(format!("%{}%", escape_like(&term.to_lowercase())))],
        });
        Ok(self)
    }

    pub fn group_by(mut self, specs: &[&str]) -> Result<Self, QueryError> {
        self.require_from()?;
        for spec in specs {
            let column = self.resolve_plain(spec)?;
            self.group_by.push(column);
        }
        Ok(self)
    }

    pub fn aggregate(mut self, kind: AggregateKind, sources: &[&str], alias: &str) -> Result<Self, QueryError> {
        self.require_from()?;

        if sources.len() != kind.arity() {
            return Err(QueryError::InvalidPlan(format!(
                "{kind:?} takes {} column(s), got {}",
                kind.arity(),
                sources.len()
            )));
        }
        if alias.trim().is_empty() {
            return Err(QueryError::InvalidPlan(format!("{kind:?} needs an output alias")));
        }
        if self.aggregates.iter().any(|a| a.alias == alias)
            || self.columns.iter().any(|c| c.output_name() == alias)
        {
            return Err(QueryError::DuplicateAlias(alias.to_string()));
        }

        let sources = sources
            .iter()
            .map(|s| self.resolve_plain(s))
            .collect::<Result<Vec<_>, _>>()?;
        self.aggregates.push(AggregateExpr {
            kind,
            sources,
            alias: alias.to_string(),
        });
        Ok(self)
    }

    /// `count("product_id as products_count")`; `count("* as n")` counts rows.
    pub fn count(self, spec: &str) -> Result<Self, QueryError> {
        self.aggregate_spec(AggregateKind::Count, spec)
    }

    pub fn count_all(self, alias: &str) -> Result<Self, QueryError> {
        self.aggregate(AggregateKind::CountAll, &[], alias)
    }

    /// `sum("quantity as quantity_sum")`
    pub fn sum(self, spec: &str) -> Result<Self, QueryError> {
        self.aggregate_spec(AggregateKind::Sum, spec)
    }

    /// `SUM(left * right) AS alias`
    pub fn sum_product(self, left: &str, right: &str, alias: &str) -> Result<Self, QueryError> {
        self.aggregate(AggregateKind::SumOfProduct, &[left, right], alias)
    }

    pub fn avg(self, spec: &str) -> Result<Self, QueryError> {
        self.aggregate_spec(AggregateKind::Avg, spec)
    }

    pub fn min(self, spec: &str) -> Result<Self, QueryError> {
        self.aggregate_spec(AggregateKind::Min, spec)
    }

    pub fn max(self, spec: &str) -> Result<Self, QueryError> {
        self.aggregate_spec(AggregateKind::Max, spec)
    }

    /// Orders by a column, or by the output alias of a selected column or aggregate.
    pub fn order_by(mut self, target: &str, order: SortOrder) -> Result<Self, QueryError> {
        self.require_from()?;

        let is_alias = self.aggregates.iter().any(|a| a.alias == target)
            || self.columns.iter().any(|c| c.alias.as_deref() == Some(target));
        let target = if is_alias {
            OrderTarget::Alias(target.to_string())
        } else {
            OrderTarget::Column(self.resolve_plain(target)?)
        };

        self.order_by.push(OrderBy { target, order });
        Ok(self)
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Final cross-checks. With nothing selected and no aggregates, every
    /// column of the primary table is selected.
    pub fn build(self) -> Result<QueryPlan, QueryError> {
        let from = self
            .from
            .ok_or_else(|| QueryError::InvalidPlan("no primary table".to_string()))?;

        let mut columns = self.columns;
        if columns.is_empty() && self.aggregates.is_empty() {
            let (scope, table) = &self.scopes[0];
            for col in &table.columns {
                columns.push(SelectedColumn {
                    column: Self::column_ref(scope, table, &col.name)?,
                    alias: None,
                });
            }
        }

        if !self.aggregates.is_empty() && !columns.is_empty() && self.group_by.is_empty() {
            return Err(QueryError::InvalidPlan(
                "aggregates combined with plain columns require GROUP BY".to_string(),
            ));
        }

        Ok(QueryPlan {
            from,
            columns,
            joins: self.joins,
            predicates: self.predicates,
            group_by: self.group_by,
            aggregates: self.aggregates,
            order_by: self.order_by,
            limit: self.limit,
            offset: self.offset,
        })
    }

    fn aggregate_spec(self, kind: AggregateKind, raw: &str) -> Result<Self, QueryError> {
        let spec = parse_column_spec(raw)?;
        let alias = spec.alias.ok_or_else(|| {
            QueryError::InvalidPlan(format!("'{raw}': aggregate needs 'as <alias>'"))
        })?;

        match (kind, spec.column) {
            (AggregateKind::Count, ColumnName::Star) if spec.qualifier.is_none() => {
                self.aggregate(AggregateKind::CountAll, &[], &alias)
            }
            (_, ColumnName::Star) => Err(QueryError::InvalidPlan(format!(
                "'{raw}': wildcard is only valid in count(*)"
            ))),
            (_, ColumnName::Named(name)) => {
                let source = match spec.qualifier {
                    Some(q) => format!("{q}.{name}"),
                    None => name,
                };
                self.aggregate(kind, &[source.as_str()], &alias)
            }
        }
    }

    // Column output names may repeat, but never shadow an aggregate alias
    fn push_column(&mut self, selected: SelectedColumn) -> Result<(), QueryError> {
        if self.aggregates.iter().any(|a| a.alias == selected.output_name()) {
            return Err(QueryError::DuplicateAlias(selected.output_name().to_string()));
        }
        self.columns.push(selected);
        Ok(())
    }

    fn require_from(&self) -> Result<(), QueryError> {
        if self.from.is_none() {
            return Err(QueryError::InvalidPlan(
                "select_from must be called first".to_string(),
            ));
        }
        Ok(())
    }

    fn scope_table(&self, name: &str) -> Option<&'r TableDescriptor> {
        self.scopes
            .iter()
            .find(|(scope, _)| scope == name)
            .map(|(_, table)| *table)
    }

    fn column_ref(scope: &str, table: &TableDescriptor, column: &str) -> Result<ColumnRef, QueryError> {
        let descriptor = table
            .get_column(column)
            .ok_or_else(|| QueryError::unknown_column(scope, column))?;
        Ok(ColumnRef {
            scope: scope.to_string(),
            table: table.name.clone(),
            column: descriptor.name.clone(),
            data_type: descriptor.data_type,
            nullable: descriptor.nullable,
        })
    }

    fn resolve(&self, qualifier: Option<&str>, column: &str) -> Result<ColumnRef, QueryError> {
        if let Some(scope) = qualifier {
            let table = self
                .scope_table(scope)
                .ok_or_else(|| QueryError::UnknownTable(scope.to_string()))?;
            return Self::column_ref(scope, table, column);
        }

        let candidates: Vec<&(String, &TableDescriptor)> = self
            .scopes
            .iter()
            .filter(|(_, table)| table.has_column(column))
            .collect();

        match candidates.as_slice() {
            [] => Err(QueryError::unknown_column(&self.scopes[0].0, column)),
            [only] => Self::column_ref(&only.0, only.1, column),
            many => Err(QueryError::AmbiguousColumn {
                column: column.to_string(),
                scopes: many.iter().map(|(scope, _)| scope.clone()).collect(),
            }),
        }
    }

    // A single column reference with no alias and no wildcard
    fn resolve_plain(&self, raw: &str) -> Result<ColumnRef, QueryError> {
        let spec = parse_column_spec(raw)?;
        match (spec.column, spec.alias) {
            (ColumnName::Named(name), None) => self.resolve(spec.qualifier.as_deref(), &name),
            _ => Err(QueryError::InvalidPlan(format!(
                "'{raw}' must be a single column reference"
            ))),
        }
    }
}
