//! Constraints - single filterable fields and their rendering into SQL
//!
//! A `Constraint` names a logical column, its storage column, its declared
//! type and a value. Binding decides whether the value means "IS NULL" or an
//! equality against a coerced parameter, appends the predicate to a shared
//! `SqlBuilder` and returns the parameters it introduced.

pub mod extensions;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, OrmResult};
use crate::security::column_reference;
use crate::value::{DataType, Value};

pub use extensions::ConstraintListExt;

/// Parameter name to bound value
pub type Parameters = HashMap<String, Value>;

/// Comparison a constraint renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equals,
    Null,
    /// Only meaningful to pattern-aware binders such as [`LikeBinder`]
    Like,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Equals => write!(f, "Equals"),
            Comparison::Null => write!(f, "Null"),
            Comparison::Like => write!(f, "Like"),
        }
    }
}

/// Accumulates predicates for one WHERE clause; predicates are ANDed in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlBuilder {
    predicates: Vec<String>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate
    pub fn and_where(&mut self, predicate: impl Into<String>) -> &mut Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Render `WHERE a AND b`, or an empty string when nothing was added
    pub fn to_where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicates.join(" AND "))
        }
    }
}

/// Replaces the default binding behavior of a constraint.
///
/// Constraints carrying a binder still merge and override by `column` like
/// any other constraint; only the rendering differs.
pub trait ConstraintBinder: Send + Sync + fmt::Debug {
    fn bind(&self, constraint: &mut Constraint, builder: &mut SqlBuilder) -> OrmResult<Parameters>;

    /// Columns this binder writes into SQL text, checked when a descriptor is validated
    fn columns(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// One filterable field and, once bound, one predicate
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Logical (property) name, used for lookup and merging
    pub column: String,
    /// Physical column name, used for the predicate and the parameter name
    pub database_column_name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub value: Value,
    pub comparison: Comparison,
    binder: Option<Arc<dyn ConstraintBinder>>,
}

impl Constraint {
    pub fn new(
        column: impl Into<String>,
        database_column_name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        value: impl Into<Value>,
        comparison: Comparison,
    ) -> Self {
        Self {
            column: column.into(),
            database_column_name: database_column_name.into(),
            data_type,
            nullable,
            value: value.into(),
            comparison,
            binder: None,
        }
    }

    /// A constraint rendered entirely by `binder`
    pub fn custom(column: impl Into<String>, binder: Arc<dyn ConstraintBinder>) -> Self {
        let column = column.into();
        Self {
            database_column_name: column.clone(),
            column,
            data_type: DataType::Object,
            nullable: false,
            value: Value::Null,
            comparison: Comparison::Equals,
            binder: Some(binder),
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_binder(mut self, binder: Arc<dyn ConstraintBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn binder(&self) -> Option<&Arc<dyn ConstraintBinder>> {
        self.binder.as_ref()
    }

    pub fn is_custom(&self) -> bool {
        self.binder.is_some()
    }

    /// Whether the value expresses an "IS NULL" search.
    ///
    /// True for an absent value, for the text `NULL` in any case, and for an
    /// empty value when the declared type has no notion of empty.
    pub fn is_null_comparison(&self) -> bool {
        if self.value.is_null() {
            return true;
        }

        let text = self.value.to_string();
        if text.eq_ignore_ascii_case("NULL") {
            return true;
        }

        text.is_empty() && !self.data_type.allows_empty()
    }

    /// Render this constraint into `builder` and return its parameters
    pub fn bind(&mut self, builder: &mut SqlBuilder) -> OrmResult<Parameters> {
        match self.binder.clone() {
            Some(binder) => binder.bind(self, builder),
            None => self.bind_default(builder),
        }
    }

    /// `column = @column` with a coerced parameter, or `column IS NULL`
    pub fn bind_default(&mut self, builder: &mut SqlBuilder) -> OrmResult<Parameters> {
        let mut parameters = Parameters::new();

        if self.is_null_comparison() {
            self.comparison = Comparison::Null;
        }

        match self.comparison {
            Comparison::Null => {
                builder.and_where(format!(
                    "{} IS NULL",
                    column_reference(&self.database_column_name)
                ));
            }
            Comparison::Equals => {
                let converted = self.value.coerce(self.data_type).map_err(|reason| {
                    tracing::warn!(
                        "Constraint {} rejected value '{}' for {}",
                        self.database_column_name,
                        self.value,
                        self.data_type
                    );
                    ModelError::Conversion {
                        column: self.database_column_name.clone(),
                        value: self.value.to_string(),
                        data_type: self.data_type.to_string(),
                        reason,
                    }
                })?;
                parameters.insert(self.database_column_name.clone(), converted);
                builder.and_where(format!(
                    "{} = @{}",
                    column_reference(&self.database_column_name),
                    self.database_column_name
                ));
            }
            other => {
                return Err(ModelError::UnsupportedComparison {
                    column: self.database_column_name.clone(),
                    comparison: other.to_string(),
                });
            }
        }

        Ok(parameters)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        let same_binder = match (&self.binder, &other.binder) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };

        same_binder
            && self.column == other.column
            && self.database_column_name == other.database_column_name
            && self.data_type == other.data_type
            && self.nullable == other.nullable
            && self.value == other.value
            && self.comparison == other.comparison
    }
}

/// Case-insensitive `UPPER(target) LIKE %VALUE%` search.
///
/// The parameter is named after the constraint's logical column so it never
/// collides with an equality parameter on the target column.
#[derive(Debug, Clone)]
pub struct LikeBinder {
    target: String,
}

impl LikeBinder {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl ConstraintBinder for LikeBinder {
    fn columns(&self) -> Vec<&str> {
        vec![self.target.as_str()]
    }

    fn bind(&self, constraint: &mut Constraint, builder: &mut SqlBuilder) -> OrmResult<Parameters> {
        let mut parameters = Parameters::new();

        if constraint.is_null_comparison() {
            constraint.comparison = Comparison::Null;
            builder.and_where(format!("{} IS NULL", column_reference(&self.target)));
            return Ok(parameters);
        }

        constraint.comparison = Comparison::Like;
        let pattern = format!("%{}%", constraint.value.to_string().to_uppercase());
        builder.and_where(format!(
            "UPPER({}) LIKE @{}",
            column_reference(&self.target),
            constraint.column
        ));
        parameters.insert(constraint.column.clone(), Value::String(pattern));

        Ok(parameters)
    }
}

/// Logic-only constraint: visible to scopes and transforms, invisible to the database
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQueryBinder;

impl ConstraintBinder for NoQueryBinder {
    fn bind(&self, _constraint: &mut Constraint, _builder: &mut SqlBuilder) -> OrmResult<Parameters> {
        Ok(Parameters::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bind(mut constraint: Constraint) -> (OrmResult<Parameters>, SqlBuilder, Constraint) {
        let mut builder = SqlBuilder::new();
        let result = constraint.bind(&mut builder);
        (result, builder, constraint)
    }

    #[test]
    fn test_string_bind() {
        let constraint = Constraint::new(
            "Column",
            "DatabaseColumnName",
            DataType::String,
            false,
            "Value",
            Comparison::Equals,
        );
        let (params, builder, _) = bind(constraint);
        let params = params.unwrap();

        assert_eq!(params.get("DatabaseColumnName"), Some(&Value::from("Value")));
        assert_eq!(
            builder.to_where_clause(),
            "WHERE DatabaseColumnName = @DatabaseColumnName"
        );
    }

    #[test]
    fn test_number_bind_coerces_text() {
        let constraint = Constraint::new("Column", "Col", DataType::Int32, false, "4", Comparison::Equals);
        let (params, _, _) = bind(constraint);

        assert_eq!(params.unwrap().get("Col"), Some(&Value::Int32(4)));
    }

    #[test]
    fn test_date_bind() {
        let now = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let constraint = Constraint::new("Column", "Col", DataType::DateTime, false, now, Comparison::Equals);
        let (params, _, _) = bind(constraint);

        assert_eq!(params.unwrap().get("Col"), Some(&Value::DateTime(now)));
    }

    #[test]
    fn test_explicit_null_bind() {
        let constraint = Constraint::new("Column", "Col", DataType::String, true, Value::Null, Comparison::Null);
        let (params, builder, bound) = bind(constraint);

        assert!(params.unwrap().is_empty());
        assert_eq!(builder.to_where_clause(), "WHERE Col IS NULL");
        assert_eq!(bound.comparison, Comparison::Null);
    }

    #[test]
    fn test_implied_null_for_empty_number() {
        let constraint = Constraint::new("Col", "Col", DataType::Int16, true, "", Comparison::Equals);
        let (params, builder, bound) = bind(constraint);

        assert!(params.unwrap().is_empty());
        assert_eq!(builder.predicates(), &["Col IS NULL".to_string()]);
        assert_eq!(bound.comparison, Comparison::Null);
    }

    #[test]
    fn test_verbose_null_any_case() {
        for text in ["NULL", "null", "NuLl"] {
            let constraint = Constraint::new("Col", "Col", DataType::String, true, text, Comparison::Equals);
            let (params, builder, _) = bind(constraint);

            assert!(params.unwrap().is_empty());
            assert_eq!(builder.to_where_clause(), "WHERE Col IS NULL");
        }
    }

    #[test]
    fn test_empty_string_is_a_literal_for_strings() {
        let constraint = Constraint::new("Col", "Col", DataType::String, false, "", Comparison::Equals);
        let (params, builder, bound) = bind(constraint);

        assert_eq!(params.unwrap().get("Col"), Some(&Value::from("")));
        assert_eq!(builder.to_where_clause(), "WHERE Col = @Col");
        assert_eq!(bound.comparison, Comparison::Equals);
    }

    #[test]
    fn test_null_intent_matrix() {
        let cases = [
            (DataType::String, Value::Null, true),
            (DataType::String, Value::from(""), false),
            (DataType::Empty, Value::from(""), false),
            (DataType::String, Value::from("null"), true),
            (DataType::Int32, Value::from(""), true),
            (DataType::DateTime, Value::from(""), true),
            (DataType::Boolean, Value::from("false"), false),
            (DataType::Int64, Value::Int64(0), false),
        ];

        for (data_type, value, expected) in cases {
            for nullable in [true, false] {
                let constraint = Constraint::new("C", "C", data_type, nullable, value.clone(), Comparison::Equals);
                assert_eq!(
                    constraint.is_null_comparison(),
                    expected,
                    "{:?} {:?} nullable={}",
                    data_type,
                    value,
                    nullable
                );
            }
        }
    }

    #[test]
    fn test_conversion_failure_names_column_and_value() {
        let constraint = Constraint::new("CategoryId", "CategoryId", DataType::Int32, true, "abc", Comparison::Equals);
        let (result, builder, _) = bind(constraint);

        let err = result.unwrap_err();
        assert!(matches!(err, ModelError::Conversion { .. }));
        let message = err.to_string();
        assert!(message.contains("CategoryId"));
        assert!(message.contains("abc"));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_like_comparison_needs_a_pattern_binder() {
        let constraint = Constraint::new("Col", "Col", DataType::String, false, "x", Comparison::Like);
        let (result, _, _) = bind(constraint);

        assert!(matches!(
            result,
            Err(ModelError::UnsupportedComparison { .. })
        ));
    }

    #[test]
    fn test_like_binder() {
        let constraint = Constraint::custom("DetailsLike", Arc::new(LikeBinder::new("DetailsColumn")))
            .with_value("car");
        let (params, builder, bound) = bind(constraint);

        assert_eq!(
            builder.to_where_clause(),
            "WHERE UPPER(DetailsColumn) LIKE @DetailsLike"
        );
        assert_eq!(params.unwrap().get("DetailsLike"), Some(&Value::from("%CAR%")));
        assert_eq!(bound.comparison, Comparison::Like);
    }

    #[test]
    fn test_no_query_binder_renders_nothing() {
        let constraint = Constraint::custom("Tenant", Arc::new(NoQueryBinder)).with_value("acme");
        let (params, builder, _) = bind(constraint);

        assert!(params.unwrap().is_empty());
        assert!(builder.is_empty());
        assert_eq!(builder.to_where_clause(), "");
    }

    #[test]
    fn test_predicates_are_anded_in_order() {
        let mut builder = SqlBuilder::new();
        let mut first = Constraint::new("A", "A", DataType::Int32, false, 1, Comparison::Equals);
        let mut second = Constraint::new("B", "B", DataType::String, true, Value::Null, Comparison::Equals);

        first.bind(&mut builder).unwrap();
        second.bind(&mut builder).unwrap();

        assert_eq!(builder.to_where_clause(), "WHERE A = @A AND B IS NULL");
    }

    #[test]
    fn test_reserved_column_names_are_quoted() {
        let mut builder = SqlBuilder::new();
        let mut group = Constraint::new("Group", "Group", DataType::String, false, "a", Comparison::Equals);
        let mut key = Constraint::new("Key", "Key", DataType::Int32, true, Value::Null, Comparison::Equals);
        let mut search = Constraint::custom("OrderLike", Arc::new(LikeBinder::new("Order"))).with_value("x");

        let params = group.bind(&mut builder).unwrap();
        key.bind(&mut builder).unwrap();
        search.bind(&mut builder).unwrap();

        assert_eq!(params.get("Group"), Some(&Value::from("a")));
        assert_eq!(
            builder.to_where_clause(),
            "WHERE \"Group\" = @Group AND \"Key\" IS NULL AND UPPER(\"Order\") LIKE @OrderLike"
        );
    }

    #[test]
    fn test_like_binder_reports_its_target() {
        assert_eq!(LikeBinder::new("DetailsColumn").columns(), vec!["DetailsColumn"]);
        assert!(NoQueryBinder.columns().is_empty());
    }
}
