/// Column and table reference grammar accepted by the builder.
///
/// Column specs: `col`, `scope.col`, `scope.col as alias`, `col as alias`,
/// `scope.*`, `*`. Table specs: `table`, `table as alias`.

use crate::types::QueryError;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{alpha1, char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnName {
    Star,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub qualifier: Option<String>,
    pub column: ColumnName,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub table: String,
    pub alias: Option<String>,
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |s: &str| s.to_string(),
    )(input)
}

// `AS alias`, requiring whitespace on both sides of the keyword
fn alias(input: &str) -> IResult<&str, String> {
    preceded(
        delimited(multispace1, tag_no_case("as"), multispace1),
        identifier,
    )(input)
}

fn column_name(input: &str) -> IResult<&str, ColumnName> {
    alt((
        map(char('*'), |_| ColumnName::Star),
        map(identifier, ColumnName::Named),
    ))(input)
}

fn column_spec(input: &str) -> IResult<&str, ColumnSpec> {
    map(
        ws(tuple((
            opt(terminated(identifier, char('.'))),
            column_name,
            opt(alias),
        ))),
        |(qualifier, column, alias)| ColumnSpec {
            qualifier,
            column,
            alias,
        },
    )(input)
}

fn table_spec(input: &str) -> IResult<&str, TableSpec> {
    map(ws(pair(identifier, opt(alias))), |(table, alias)| TableSpec {
        table,
        alias,
    })(input)
}

pub fn parse_column_spec(input: &str) -> Result<ColumnSpec, QueryError> {
    all_consuming(column_spec)(input)
        .map(|(_, spec)| spec)
        .map_err(|_| QueryError::InvalidPlan(format!("malformed column reference '{input}'")))
}

pub fn parse_table_spec(input: &str) -> Result<TableSpec, QueryError> {
    all_consuming(table_spec)(input)
        .map(|(_, spec)| spec)
        .map_err(|_| QueryError::InvalidPlan(format!("malformed table reference '{input}'")))
}

// Calls `visit` with each character outside quoted literals and identifiers
fn for_each_unquoted(fragment: &str, mut visit: impl FnMut(usize, char)) {
    let mut quote: Option<char> = None;

    for (at, c) in fragment.char_indices() {
        match (quote, c) {
            (None, '\'' | '"' | '`') => quote = Some(c),
            // A doubled quote closes and reopens, which nets out correctly
            (Some(q), c) if c == q => quote = None,
            (None, c) => visit(at, c),
            _ => {}
        }
    }
}

/// Counts `?` placeholders outside quoted literals and quoted identifiers.
pub fn count_placeholders(fragment: &str) -> usize {
    let mut count = 0;
    for_each_unquoted(fragment, |_, c| {
        if c == '?' {
            count += 1;
        }
    });
    count
}

/// Rejects numbered (`?1`) and named (`:id`, `@id`, `$id`) placeholders.
/// Parameters bind by position, so only anonymous `?` is accepted.
pub fn check_placeholder_style(fragment: &str) -> Result<(), QueryError> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut found: Option<usize> = None;

    for_each_unquoted(fragment, |at, c| {
        if found.is_some() {
            return;
        }
        let next = fragment[at + c.len_utf8()..].chars().next();
        let numbered = c == '?' && next.is_some_and(|n| n.is_ascii_digit());
        let named = matches!(c, ':' | '@' | '$') && next.is_some_and(is_word);
        if numbered || named {
            found = Some(at);
        }
    });

    match found {
        None => Ok(()),
        Some(at) => {
            let rest = &fragment[at + 1..];
            let end = at + 1 + rest.find(|n: char| !is_word(n)).unwrap_or(rest.len());
            Err(QueryError::InvalidPlan(format!(
                "placeholder '{}' in '{fragment}' is not supported; use '?'",
                &fragment[at..end]
            )))
        }
    }
}

/// Escapes LIKE wildcards so `term` matches literally under `ESCAPE '\'`.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Double-quotes an identifier for SQLite, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_column() {
        let spec = parse_column_spec("company_name").unwrap();
        assert_eq!(spec.qualifier, None);
        assert_eq!(spec.column, ColumnName::Named("company_name".to_string()));
        assert_eq!(spec.alias, None);
    }

    #[test]
    fn test_parse_qualified_aliased_column() {
        let spec = parse_column_spec("e2.last_name as e2_last_name").unwrap();
        assert_eq!(spec.qualifier.as_deref(), Some("e2"));
        assert_eq!(spec.column, ColumnName::Named("last_name".to_string()));
        assert_eq!(spec.alias.as_deref(), Some("e2_last_name"));
    }

    #[test]
    fn test_parse_alias_keyword_case_insensitive() {
        let spec = parse_column_spec("  quantity AS quantity_sum ").unwrap();
        assert_eq!(spec.alias.as_deref(), Some("quantity_sum"));
    }

    #[test]
    fn test_parse_star() {
        let spec = parse_column_spec("order_detail.*").unwrap();
        assert_eq!(spec.qualifier.as_deref(), Some("order_detail"));
        assert_eq!(spec.column, ColumnName::Star);
        assert_eq!(parse_column_spec("*").unwrap().column, ColumnName::Star);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_column_spec("id; DROP TABLE customer").is_err());
        assert!(parse_column_spec("a.b.c").is_err());
        assert!(parse_column_spec("").is_err());
        assert!(parse_column_spec("id as").is_err());
    }

    #[test]
    fn test_parse_column_named_like_keyword_prefix() {
        // "assets" must not be split into `as` + `sets`
        let spec = parse_column_spec("assets").unwrap();
        assert_eq!(spec.column, ColumnName::Named("assets".to_string()));
    }

    #[test]
    fn test_parse_table_spec() {
        let spec = parse_table_spec("employee as e1").unwrap();
        assert_eq!(spec.table, "employee");
        assert_eq!(spec.alias.as_deref(), Some("e1"));
        assert_eq!(parse_table_spec("order").unwrap().alias, None);
        assert!(parse_table_spec("order.id").is_err());
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("e1.id = ?"), 1);
        assert_eq!(count_placeholders("a = ? AND b BETWEEN ? AND ?"), 3);
        assert_eq!(count_placeholders("name = 'what?' AND id = ?"), 1);
        assert_eq!(count_placeholders("note = 'it''s?'"), 0);
        assert_eq!(count_placeholders("\"odd?col\" = ?"), 1);
        assert_eq!(count_placeholders("discontinued = 1"), 0);
    }

    #[test]
    fn test_numbered_and_named_placeholders_rejected() {
        for fragment in ["id = ?1", "id = ?1 OR supplier_id = ?1", "id = :id", "id = @id", "id = $id"] {
            let err = check_placeholder_style(fragment).unwrap_err();
            assert!(matches!(err, QueryError::InvalidPlan(_)), "{fragment}");
        }

        let err = check_placeholder_style("a = ? AND b = :b_2").unwrap_err().to_string();
        assert!(err.contains("':b_2'"), "{err}");
    }

    #[test]
    fn test_placeholder_lookalikes_in_quotes_accepted() {
        check_placeholder_style("e1.id = ?").unwrap();
        check_placeholder_style("note = 'at 10:30 ?1 $5' AND id = ?").unwrap();
        check_placeholder_style("\"odd:col\" = ?").unwrap();
        check_placeholder_style("a = ? AND b = ?").unwrap();
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("ana"), "ana");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
