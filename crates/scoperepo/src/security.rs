//! Identifier safety for generated statements
//!
//! Values never reach SQL text; they always travel as parameters. What does
//! reach SQL text is table names, column names and parameter names taken
//! from model descriptors and `ORDER BY` input, and those go through here.

use crate::error::ModelError;

/// Longest identifier accepted in a descriptor
const MAX_IDENTIFIER_LEN: usize = 63;

/// Reserved words of SQLite and PostgreSQL, sorted
static RESERVED_WORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYSE", "ANALYZE", "AND",
    "ARRAY", "AS", "ASC", "ASYMMETRIC", "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN",
    "BOTH", "BY", "CASCADE", "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT",
    "CONSTRAINT", "CREATE", "CROSS", "CURRENT", "CURRENT_CATALOG", "CURRENT_DATE",
    "CURRENT_ROLE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "DATABASE", "DECLARE",
    "DEFAULT", "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP",
    "EACH", "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXEC", "EXECUTE",
    "EXISTS", "EXPLAIN", "FAIL", "FALSE", "FETCH", "FILTER", "FIRST", "FOLLOWING", "FOR",
    "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB", "GRANT", "GROUP", "GROUPS", "HAVING", "IF",
    "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED", "INITIALLY", "INNER", "INSERT", "INSTEAD",
    "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY", "LAST", "LATERAL", "LEADING", "LEFT",
    "LIKE", "LIMIT", "LOCALTIME", "LOCALTIMESTAMP", "MATCH", "MATERIALIZED", "NATURAL", "NO",
    "NOT", "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "ONLY", "OR", "ORDER",
    "OTHERS", "OUTER", "OVER", "PARTITION", "PLACING", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY",
    "QUERY", "RAISE", "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE",
    "RENAME", "REPLACE", "RESTRICT", "RETURNING", "REVOKE", "RIGHT", "ROLLBACK", "ROW", "ROWS",
    "SAVEPOINT", "SELECT", "SESSION_USER", "SET", "SOME", "SYMMETRIC", "TABLE", "TEMP",
    "TEMPORARY", "THEN", "TIES", "TO", "TRAILING", "TRANSACTION", "TRIGGER", "TRUE", "TRUNCATE",
    "UNBOUNDED", "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VACUUM", "VALUES", "VARIADIC",
    "VIEW", "VIRTUAL", "WHEN", "WHERE", "WINDOW", "WITH", "WITHOUT",
];

/// Escape a SQL identifier (table name, column name, etc.)
///
/// Doubles any embedded double quote and wraps the identifier in double quotes.
///
/// # Examples
/// ```
/// use scoperepo::security::escape_identifier;
///
/// assert_eq!(escape_identifier("Todos"), "\"Todos\"");
/// assert_eq!(escape_identifier("table\"name"), "\"table\"\"name\"");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Whether `identifier` is a reserved word in any supported dialect
pub fn is_reserved_word(identifier: &str) -> bool {
    let upper = identifier.to_ascii_uppercase();
    RESERVED_WORDS.binary_search(&upper.as_str()).is_ok()
}

/// A column as written in a WHERE predicate.
///
/// Plain names stay bare (`Deleted`); reserved words are quoted (`"Group"`).
/// Parameter placeholders keep the bare name either way.
///
/// ```
/// use scoperepo::security::column_reference;
///
/// assert_eq!(column_reference("Deleted"), "Deleted");
/// assert_eq!(column_reference("Group"), "\"Group\"");
/// ```
pub fn column_reference(column: &str) -> String {
    if is_reserved_word(column) {
        escape_identifier(column)
    } else {
        column.to_string()
    }
}

/// Validate that an identifier can name a table, column or parameter.
///
/// Only ASCII letters, digits and underscores are accepted, which is also
/// the alphabet of `@name` placeholders. Reserved words pass; they are quoted
/// wherever they reach SQL text.
pub fn validate_identifier(identifier: &str) -> Result<(), ModelError> {
    let first = identifier
        .chars()
        .next()
        .ok_or_else(|| ModelError::Validation("Identifier cannot be empty".to_string()))?;

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !is_identifier_char(*c)) {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' must start with a letter or underscore",
            identifier
        )));
    }

    Ok(())
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
