//! Statement generation from model descriptors
//!
//! Statements use `@Name` placeholders: WHERE fragments from a [`Bindable`]
//! name parameters after database columns, while column lists for INSERT and
//! UPDATE name them after properties, matching [`ModelDescriptor::values_of`].
//!
//! [`Bindable`]: crate::builder::Bindable

use std::fmt;

use crate::backends::SqlDialect;
use crate::error::{ModelError, OrmResult};
use crate::model::ModelDescriptor;

/// Sort direction of one ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Renders the statements of one model for one dialect
#[derive(Debug, Clone, Copy)]
pub struct Statements<'a> {
    descriptor: &'a ModelDescriptor,
    dialect: SqlDialect,
}

impl<'a> Statements<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, dialect: SqlDialect) -> Self {
        Self {
            descriptor,
            dialect,
        }
    }

    fn quote(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    fn table(&self) -> String {
        self.quote(self.descriptor.table())
    }

    /// Selectable columns, aliased to property names where they differ
    fn column_list(&self) -> String {
        self.descriptor
            .selectable()
            .map(|p| {
                if p.database_column_name() == p.name() {
                    self.quote(p.name())
                } else {
                    format!("{} AS {}", self.quote(p.database_column_name()), self.quote(p.name()))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn select(&self, where_clause: &str) -> String {
        let sql = format!("SELECT {} FROM {}", self.column_list(), self.table());
        with_where(sql, where_clause)
    }

    pub fn count(&self, where_clause: &str) -> String {
        with_where(format!("SELECT COUNT(1) FROM {}", self.table()), where_clause)
    }

    /// One page of rows; pages are numbered from 1.
    ///
    /// Without an explicit order the key columns are used so paging is stable.
    pub fn select_paged(
        &self,
        where_clause: &str,
        order_by: &str,
        page_number: u32,
        rows_per_page: u32,
    ) -> OrmResult<String> {
        if page_number < 1 {
            return Err(ModelError::Validation("Page numbers start at 1".to_string()));
        }
        if rows_per_page < 1 {
            return Err(ModelError::Validation(
                "Rows per page must be at least 1".to_string(),
            ));
        }

        let mut terms = self.parse_order_by(order_by)?;
        if terms.is_empty() {
            terms = self
                .descriptor
                .key_properties()
                .into_iter()
                .map(|p| (self.quote(p.database_column_name()), OrderDirection::Asc))
                .collect();
        }

        let mut sql = self.select(where_clause);
        if !terms.is_empty() {
            let rendered: Vec<String> = terms
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&rendered.join(", "));
        }

        let offset = u64::from(page_number - 1) * u64::from(rows_per_page);
        sql.push_str(&format!(" LIMIT {} OFFSET {}", rows_per_page, offset));
        Ok(sql)
    }

    /// Parse `Name [ASC|DESC], ...` into quoted columns.
    ///
    /// Names may be property names or column names of selectable properties.
    pub fn parse_order_by(&self, order_by: &str) -> OrmResult<Vec<(String, OrderDirection)>> {
        let mut terms = Vec::new();

        for term in order_by.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mut parts = term.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let direction = match parts.next() {
                None => OrderDirection::Asc,
                Some(d) if d.eq_ignore_ascii_case("ASC") => OrderDirection::Asc,
                Some(d) if d.eq_ignore_ascii_case("DESC") => OrderDirection::Desc,
                Some(d) => {
                    return Err(ModelError::Validation(format!(
                        "Unknown sort direction '{}' in '{}'",
                        d, term
                    )))
                }
            };
            if parts.next().is_some() {
                return Err(ModelError::Validation(format!("Malformed ORDER BY term '{}'", term)));
            }

            let property = self
                .descriptor
                .get_property(name)
                .filter(|p| p.is_selectable())
                .or_else(|| {
                    self.descriptor
                        .property_by_column(name)
                        .filter(|p| p.is_selectable())
                })
                .ok_or_else(|| {
                    ModelError::Validation(format!(
                        "Cannot order '{}' by unknown column '{}'",
                        self.descriptor.table(),
                        name
                    ))
                })?;

            terms.push((self.quote(property.database_column_name()), direction));
        }

        Ok(terms)
    }

    /// INSERT of every insertable column, followed by the model's insert suffix
    pub fn insert(&self) -> String {
        let properties = self.descriptor.insertable();

        let mut sql = if properties.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table())
        } else {
            let columns: Vec<String> = properties
                .iter()
                .map(|p| self.quote(p.database_column_name()))
                .collect();
            let values: Vec<String> = properties.iter().map(|p| format!("@{}", p.name())).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table(),
                columns.join(", "),
                values.join(", ")
            )
        };

        if let Some(suffix) = self.descriptor.suffix() {
            sql.push_str(suffix);
        }
        sql
    }

    pub fn update(&self, where_clause: &str) -> OrmResult<String> {
        let assignments: Vec<String> = self
            .descriptor
            .updatable()
            .into_iter()
            .map(|p| format!("{} = @{}", self.quote(p.database_column_name()), p.name()))
            .collect();

        if assignments.is_empty() {
            return Err(ModelError::Validation(format!(
                "'{}' has no updatable columns",
                self.descriptor.table()
            )));
        }

        let sql = format!("UPDATE {} SET {}", self.table(), assignments.join(", "));
        Ok(with_where(sql, where_clause))
    }

    pub fn delete(&self, where_clause: &str) -> String {
        with_where(format!("DELETE FROM {}", self.table()), where_clause)
    }

    /// `"Key" = @Key` for every key property, ANDed
    pub fn key_predicate(&self) -> OrmResult<String> {
        let keys = self.descriptor.require_keys()?;
        Ok(keys
            .iter()
            .map(|p| format!("{} = @{}", self.quote(p.database_column_name()), p.name()))
            .collect::<Vec<_>>()
            .join(" AND "))
    }

    /// Extend a WHERE clause (possibly empty) with the key predicate
    pub fn where_with_key(&self, where_clause: &str) -> OrmResult<String> {
        let key = self.key_predicate()?;
        if where_clause.is_empty() {
            Ok(format!("WHERE {}", key))
        } else {
            Ok(format!("{} AND {}", where_clause, key))
        }
    }
}

fn with_where(mut sql: String, where_clause: &str) -> String {
    if !where_clause.is_empty() {
        sql.push(' ');
        sql.push_str(where_clause);
    }
    sql
}
