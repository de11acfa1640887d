/// Parameter binding for compiled plans.
///
/// Each predicate fragment owns its values and the compiler emits fragments in
/// declaration order, so flattening in that order lines values up with
/// placeholders.

use crate::types::{QueryError, Value};
use super::plan::QueryPlan;

pub struct ParameterBinder;

impl ParameterBinder {
    /// Flat parameter list in placeholder order.
    ///
    /// Fails if a fragment's placeholder count disagrees with its values, which
    /// the builder already rules out.
    pub fn bind(plan: &QueryPlan) -> Result<Vec<Value>, QueryError> {
        let mut params = Vec::new();

        for fragment in plan.predicates() {
            let placeholders = fragment.placeholder_count();
            if placeholders != fragment.params.len() {
                return Err(QueryError::Compile(format!(
                    "fragment '{}' has {placeholders} placeholder(s) but {} parameter(s)",
                    fragment.text,
                    fragment.params.len()
                )));
            }
            params.extend(fragment.params.iter().cloned());
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::PredicateFragment;
    use crate::query::QueryBuilder;
    use crate::schema::northwind;

    #[test]
    fn test_bind_follows_fragment_order() {
        let registry = northwind().unwrap();
        let plan = QueryBuilder::new(&registry)
            .select_from("product")
            .unwrap()
            .where_raw("units_in_stock > ?", vec![Value::Integer(5)])
            .unwrap()
            .where_raw("unit_price BETWEEN ? AND ?", vec![Value::Real(1.0), Value::Real(9.5)])
            .unwrap()
            .where_raw("LOWER(name) LIKE ?", vec![Value::from("%tea%")])
            .unwrap()
            .build()
            .unwrap();

        let params = ParameterBinder::bind(&plan).unwrap();
        assert_eq!(
            params,
            vec![
                Value::Integer(5),
                Value::Real(1.0),
                Value::Real(9.5),
                Value::Text("%tea%".to_string()),
            ]
        );
    }

    #[test]
    fn test_bind_without_predicates_is_empty() {
        let registry = northwind().unwrap();
        let plan = QueryBuilder::new(&registry)
            .select_from("supplier")
            .unwrap()
            .build()
            .unwrap();
        assert!(ParameterBinder::bind(&plan).unwrap().is_empty());
    }

    #[test]
    fn test_bind_rejects_unbalanced_fragment() {
        let registry = northwind().unwrap();
        let mut plan = QueryBuilder::new(&registry)
            .select_from("supplier")
            .unwrap()
            .build()
            .unwrap();
        plan.predicates.push(PredicateFragment {
            text: "id = ? OR id = ?".to_string(),
            params: vec![Value::Integer(1)],
        });

        assert!(matches!(ParameterBinder::bind(&plan), Err(QueryError::Compile(_))));
    }
}
