//! Core execution traits and types
//!
//! Generated statements name their parameters (`@Name`). An executor compiles
//! them into its driver's positional style with [`compile_named`], runs them,
//! and hands rows back as ordered column/value pairs.

use async_trait::async_trait;

use crate::constraint::Parameters;
use crate::error::{ModelError, OrmResult};
use crate::security::escape_identifier;
use crate::value::Value;

/// Runs generated statements against a database
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Get the SQL dialect used by this executor
    fn dialect(&self) -> SqlDialect;

    /// Execute a query and return the result rows
    async fn fetch_all(&self, sql: &str, parameters: &Parameters) -> OrmResult<Vec<Row>>;

    /// Execute a statement and return what it changed
    async fn execute(&self, sql: &str, parameters: &Parameters) -> OrmResult<ExecuteResult>;
}

/// Outcome of a data-changing statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    pub rows_affected: u64,
    /// Row id generated by an INSERT, when the driver reports one
    pub last_insert_id: Option<i64>,
}

/// One result row as ordered column/value pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Get a column value by name, exact match first, then case-insensitive
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(column, _)| column.eq_ignore_ascii_case(name))
            })
            .map(|(_, value)| value)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.columns.get(index).map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(column, _)| column.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// SQL dialect enumeration for database-specific SQL generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Quote a table or column name for this dialect
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            SqlDialect::MySQL => format!("`{}`", identifier.replace('`', "``")),
            SqlDialect::PostgreSQL | SqlDialect::SQLite => escape_identifier(identifier),
        }
    }

    /// Whether a repeated named parameter can reuse one positional slot
    fn reuses_placeholders(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL)
    }
}

/// A statement in positional form with its values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrite `@name` placeholders into the dialect's positional style.
///
/// Text inside quotes and `--` comments is copied untouched. Names resolve
/// exactly first, then case-insensitively; a name with no parameter is an error.
pub fn compile_named(sql: &str, parameters: &Parameters, dialect: SqlDialect) -> OrmResult<CompiledQuery> {
    let mut output = String::with_capacity(sql.len());
    let mut values: Vec<Value> = Vec::new();
    let mut slots: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                output.push(c);
                for inner in chars.by_ref() {
                    output.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                output.push(c);
                for inner in chars.by_ref() {
                    output.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '@' if chars.peek().map_or(false, |n| n.is_ascii_alphabetic() || *n == '_') => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let value = lookup(parameters, &name)
                    .ok_or_else(|| ModelError::Query(format!("No value supplied for parameter @{}", name)))?;

                if dialect.reuses_placeholders() {
                    let slot = match slots.iter().position(|s| s == &name) {
                        Some(slot) => slot,
                        None => {
                            slots.push(name);
                            values.push(value.clone());
                            slots.len() - 1
                        }
                    };
                    output.push_str(&dialect.parameter_placeholder(slot));
                } else {
                    output.push_str(&dialect.parameter_placeholder(values.len()));
                    values.push(value.clone());
                }
            }
            _ => output.push(c),
        }
    }

    Ok(CompiledQuery { sql: output, values })
}

fn lookup<'a>(parameters: &'a Parameters, name: &str) -> Option<&'a Value> {
    parameters.get(name).or_else(|| {
        parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_sqlite_placeholders_follow_occurrence_order() {
        let parameters = params(&[("Id", Value::Int32(1)), ("Deleted", Value::Bool(false))]);
        let compiled = compile_named(
            "SELECT \"Id\" FROM \"Todos\" WHERE Id = @Id AND Deleted = @Deleted",
            &parameters,
            SqlDialect::SQLite,
        )
        .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT \"Id\" FROM \"Todos\" WHERE Id = ? AND Deleted = ?"
        );
        assert_eq!(compiled.values, vec![Value::Int32(1), Value::Bool(false)]);
    }

    #[test]
    fn test_postgres_reuses_slots_for_repeated_names() {
        let parameters = params(&[("A", Value::Int32(1)), ("B", Value::Int32(2))]);
        let compiled = compile_named("x = @A OR y = @B OR z = @A", &parameters, SqlDialect::PostgreSQL).unwrap();

        assert_eq!(compiled.sql, "x = $1 OR y = $2 OR z = $1");
        assert_eq!(compiled.values.len(), 2);
    }

    #[test]
    fn test_quoted_text_and_comments_are_left_alone() {
        let parameters = params(&[("Id", Value::Int32(1))]);
        let compiled = compile_named(
            "SELECT '@not' FROM t WHERE Id = @Id; -- @Comment",
            &parameters,
            SqlDialect::SQLite,
        )
        .unwrap();

        assert_eq!(compiled.sql, "SELECT '@not' FROM t WHERE Id = ?; -- @Comment");
        assert_eq!(compiled.values, vec![Value::Int32(1)]);
    }

    #[test]
    fn test_names_fall_back_to_case_insensitive_match() {
        let parameters = params(&[("detailslike", Value::from("%A%"))]);
        let compiled = compile_named("UPPER(D) LIKE @DetailsLike", &parameters, SqlDialect::SQLite).unwrap();

        assert_eq!(compiled.values, vec![Value::from("%A%")]);
    }

    #[test]
    fn test_missing_parameter_is_a_query_error() {
        let result = compile_named("Id = @Id", &Parameters::new(), SqlDialect::SQLite);
        assert!(matches!(result, Err(ModelError::Query(_))));
    }

    #[test]
    fn test_row_lookup() {
        let row = Row::new(vec![
            ("Id".to_string(), Value::Int64(1)),
            ("Details".to_string(), Value::from("x")),
        ]);

        assert_eq!(row.get("details"), Some(&Value::from("x")));
        assert_eq!(row.get_by_index(0), Some(&Value::Int64(1)));
        assert!(row.get("Missing").is_none());
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["Id", "Details"]);
    }

    #[test]
    fn test_quote_identifier_per_dialect() {
        assert_eq!(SqlDialect::SQLite.quote_identifier("Todos"), "\"Todos\"");
        assert_eq!(SqlDialect::MySQL.quote_identifier("Todos"), "`Todos`");
    }
}
