//! WHERE clause orchestration
//!
//! `Builder` threads filter input through resolution, scope merging, the
//! transform hook and binding, and produces a [`Bindable`]. It is a value
//! type: the scoping toggle and global parameters are changed by methods that
//! return a new builder, so a configured builder can be shared freely.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::constrainable::ConstraintResolver;
use crate::constraint::{Constraint, Parameters, SqlBuilder};
use crate::error::OrmResult;
use crate::model::Constrainable;
use crate::value::Value;

/// A rendered WHERE fragment and the parameters its placeholders name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindable {
    /// `WHERE ...`, or empty when nothing constrains the query
    pub sql: String,
    pub parameters: Parameters,
}

impl Bindable {
    pub fn new(sql: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Repository-supplied scoping rules.
///
/// `scoped_constraints` contributes constraints that override caller input
/// by column; `transform_constraints` gets the merged list last.
pub trait ConstraintScope: Send + Sync {
    fn scoped_constraints(
        &self,
        _current: &[Constraint],
        _resolver: &ConstraintResolver,
    ) -> OrmResult<Vec<Constraint>> {
        Ok(Vec::new())
    }

    fn transform_constraints(&self, constraints: Vec<Constraint>) -> OrmResult<Vec<Constraint>> {
        Ok(constraints)
    }
}

/// No scoped constraints and no transforms
#[derive(Debug, Clone, Copy, Default)]
pub struct Unscoped;

impl ConstraintScope for Unscoped {}

/// Adapts a closure into a [`ConstraintScope`]
pub struct ScopeFn<F> {
    scoped: F,
}

impl<F> ConstraintScope for ScopeFn<F>
where
    F: Fn(&[Constraint], &ConstraintResolver) -> OrmResult<Vec<Constraint>> + Send + Sync,
{
    fn scoped_constraints(
        &self,
        current: &[Constraint],
        resolver: &ConstraintResolver,
    ) -> OrmResult<Vec<Constraint>> {
        (self.scoped)(current, resolver)
    }
}

/// Build a scope from a closure producing the scoped constraints
///
/// ```
/// use scoperepo::builder::scope_fn;
///
/// let not_deleted = scope_fn(|_current, resolver| {
///     Ok(resolver.constraints([("Deleted", false)]))
/// });
/// # let _ = not_deleted;
/// ```
pub fn scope_fn<F>(scoped: F) -> Arc<dyn ConstraintScope>
where
    F: Fn(&[Constraint], &ConstraintResolver) -> OrmResult<Vec<Constraint>> + Send + Sync + 'static,
{
    Arc::new(ScopeFn { scoped })
}

/// Replace-or-append `additional` into `original` by column (case-insensitive).
///
/// Replacement keeps the original position; new columns are appended in
/// their own order. Repeated columns within `additional` collapse to the last.
pub fn merge_constraints(original: Vec<Constraint>, additional: Vec<Constraint>) -> Vec<Constraint> {
    let mut output = original;

    for constraint in additional {
        match output
            .iter()
            .position(|c| c.column.eq_ignore_ascii_case(&constraint.column))
        {
            Some(index) => output[index] = constraint,
            None => output.push(constraint),
        }
    }

    output
}

/// Bind every constraint into one shared WHERE clause
pub fn bind_constraints(constraints: Vec<Constraint>) -> OrmResult<Bindable> {
    let mut builder = SqlBuilder::new();
    let mut parameters = Parameters::new();

    for mut constraint in constraints {
        parameters.extend(constraint.bind(&mut builder)?);
    }

    Ok(Bindable::new(builder.to_where_clause(), parameters))
}

/// Produces bindables for the constraints model `C`
pub struct Builder<C: Constrainable> {
    resolver: ConstraintResolver,
    scope: Arc<dyn ConstraintScope>,
    apply_scoped: bool,
    parameters: Parameters,
    _constraints: PhantomData<fn() -> C>,
}

impl<C: Constrainable> Clone for Builder<C> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            scope: Arc::clone(&self.scope),
            apply_scoped: self.apply_scoped,
            parameters: self.parameters.clone(),
            _constraints: PhantomData,
        }
    }
}

impl<C: Constrainable> fmt::Debug for Builder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("table", &self.resolver.descriptor().table())
            .field("apply_scoped", &self.apply_scoped)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl<C: Constrainable> Builder<C> {
    /// Unscoped builder over the descriptor of `C`
    pub fn new() -> OrmResult<Self> {
        Self::with_scope(Arc::new(Unscoped))
    }

    pub fn with_scope(scope: Arc<dyn ConstraintScope>) -> OrmResult<Self> {
        Ok(Self {
            resolver: ConstraintResolver::for_model::<C>()?,
            scope,
            apply_scoped: true,
            parameters: Parameters::new(),
            _constraints: PhantomData,
        })
    }

    pub fn resolver(&self) -> &ConstraintResolver {
        &self.resolver
    }

    pub fn scope(&self) -> &Arc<dyn ConstraintScope> {
        &self.scope
    }

    pub fn applies_scoped_constraints(&self) -> bool {
        self.apply_scoped
    }

    /// A copy of this builder with scoping enabled
    pub fn apply_scoped_constraints(&self) -> Self {
        let mut next = self.clone();
        next.apply_scoped = true;
        next
    }

    /// A copy of this builder with scoping disabled; the receiver keeps its setting
    pub fn remove_scoped_constraints(&self) -> Self {
        let mut next = self.clone();
        next.apply_scoped = false;
        next
    }

    /// A copy of this builder with a global parameter added or replaced
    pub fn with_parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.parameters.insert(name.into(), value.into());
        next
    }

    pub fn clear_parameters(&self) -> Self {
        let mut next = self.clone();
        next.parameters.clear();
        next
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Scoped constraints for `current`, or none while scoping is removed
    pub fn scoped_constraints(&self, current: &[Constraint]) -> OrmResult<Vec<Constraint>> {
        if !self.apply_scoped {
            return Ok(Vec::new());
        }
        self.scope.scoped_constraints(current, &self.resolver)
    }

    /// [`merge_constraints`] while scoping applies, otherwise `original` untouched
    pub fn merge_constraints(
        &self,
        original: Vec<Constraint>,
        additional: Vec<Constraint>,
    ) -> Vec<Constraint> {
        if !self.apply_scoped {
            return original;
        }
        merge_constraints(original, additional)
    }

    /// Resolve, scope, transform and bind `constraints`
    pub fn where_constraints(&self, constraints: Vec<Constraint>) -> OrmResult<Bindable> {
        let scoped = self.scoped_constraints(&constraints)?;
        let combined = self.merge_constraints(constraints, scoped);
        let transformed = self.scope.transform_constraints(combined)?;

        tracing::trace!(
            "Binding {} constraints for {} (scoped: {})",
            transformed.len(),
            self.resolver.descriptor().table(),
            self.apply_scoped
        );

        let bindable = bind_constraints(transformed)?;
        Ok(self.combine_parameters(bindable))
    }

    pub fn where_map<I, K, V>(&self, filters: I) -> OrmResult<Bindable>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.where_constraints(self.resolver.constraints(filters))
    }

    pub fn where_json(&self, object: &JsonMap<String, JsonValue>) -> OrmResult<Bindable> {
        self.where_constraints(self.resolver.constraints_from_json(object))
    }

    pub fn where_from_json(&self, text: &str) -> OrmResult<Bindable> {
        self.where_constraints(self.resolver.constraints_from_json_str(text)?)
    }

    /// Global parameters win over bound ones by key
    fn combine_parameters(&self, mut bindable: Bindable) -> Bindable {
        for (name, value) in &self.parameters {
            bindable.parameters.insert(name.clone(), value.clone());
        }

        tracing::trace!("Bound parameters: {:?}", bindable.parameters);
        bindable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Comparison, LikeBinder};
    use crate::error::ModelError;
    use crate::model::{ModelDescriptor, Property};
    use crate::value::DataType;

    struct Todo;

    impl Constrainable for Todo {
        fn describe() -> ModelDescriptor {
            ModelDescriptor::new("Todos")
                .property(Property::new("Id", DataType::Int32).key())
                .property(Property::new("Details", DataType::String).nullable().column("DetailsColumn"))
                .property(Property::new("Completed", DataType::Boolean))
                .property(Property::new("Deleted", DataType::Boolean))
                .property(Property::custom(
                    "DetailsLike",
                    Arc::new(LikeBinder::new("DetailsColumn")),
                ))
        }
    }

    fn not_deleted() -> Arc<dyn ConstraintScope> {
        scope_fn(|_, resolver| Ok(resolver.constraints([("Deleted", false)])))
    }

    fn constraint(column: &str, value: i32) -> Constraint {
        Constraint::new(column, column, DataType::Int32, false, value, Comparison::Equals)
    }

    #[test]
    fn test_merge_replaces_in_place_and_appends() {
        let original = vec![constraint("A", 1), constraint("B", 2)];
        let additional = vec![constraint("b", 20), constraint("C", 30)];

        let merged = merge_constraints(original, additional);
        let summary: Vec<(String, Value)> = merged
            .into_iter()
            .map(|c| (c.column, c.value))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("A".to_string(), Value::Int32(1)),
                ("b".to_string(), Value::Int32(20)),
                ("C".to_string(), Value::Int32(30)),
            ]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = vec![constraint("A", 1), constraint("B", 2)];
        let b = vec![constraint("B", 5), constraint("C", 3), constraint("C", 4)];

        let once = merge_constraints(a, b.clone());
        let twice = merge_constraints(once.clone(), b);
        assert_eq!(once, twice);

        let from_empty = merge_constraints(Vec::new(), vec![constraint("C", 3), constraint("C", 4)]);
        assert_eq!(merge_constraints(from_empty.clone(), vec![constraint("C", 4)]), from_empty);
        assert_eq!(from_empty.len(), 1);
    }

    #[test]
    fn test_where_without_constraints_is_empty() {
        let builder = Builder::<Todo>::new().unwrap();
        let bindable = builder.where_constraints(Vec::new()).unwrap();

        assert!(bindable.is_empty());
        assert!(bindable.parameters.is_empty());
    }

    #[test]
    fn test_scope_overrides_caller_value() {
        let builder = Builder::<Todo>::with_scope(not_deleted()).unwrap();
        let bindable = builder
            .where_map(vec![("Id", Value::Int32(1)), ("Deleted", Value::Bool(true))])
            .unwrap();

        assert_eq!(bindable.sql, "WHERE Id = @Id AND Deleted = @Deleted");
        assert_eq!(bindable.parameters.get("Deleted"), Some(&Value::Bool(false)));
        assert_eq!(bindable.parameters.get("Id"), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_scoped_entries_follow_caller_entries() {
        let builder = Builder::<Todo>::with_scope(not_deleted()).unwrap();
        let bindable = builder.where_map([("Completed", "true")]).unwrap();

        assert_eq!(bindable.sql, "WHERE Completed = @Completed AND Deleted = @Deleted");
    }

    #[test]
    fn test_removing_scope_returns_a_new_builder() {
        let scoped = Builder::<Todo>::with_scope(not_deleted()).unwrap();
        let unscoped = scoped.remove_scoped_constraints();

        assert_eq!(unscoped.where_constraints(Vec::new()).unwrap().sql, "");
        assert_eq!(
            scoped.where_constraints(Vec::new()).unwrap().sql,
            "WHERE Deleted = @Deleted"
        );
        assert!(scoped.applies_scoped_constraints());
        assert!(!unscoped.applies_scoped_constraints());
        assert!(unscoped.apply_scoped_constraints().applies_scoped_constraints());
    }

    #[test]
    fn test_unscoped_builder_does_not_consult_scope() {
        let scope = scope_fn(|_, _| Err(ModelError::Query("scope consulted".to_string())));
        let builder = Builder::<Todo>::with_scope(scope).unwrap();

        assert!(builder.where_constraints(Vec::new()).is_err());
        assert!(builder
            .remove_scoped_constraints()
            .where_constraints(Vec::new())
            .is_ok());
    }

    #[test]
    fn test_custom_constraint_replaced_by_scoped_constraint() {
        let scope = scope_fn(|_, resolver| {
            Ok(resolver
                .constraint("DetailsLike", "scoped")
                .into_iter()
                .collect())
        });
        let builder = Builder::<Todo>::with_scope(scope).unwrap();
        let bindable = builder.where_map([("DetailsLike", "caller")]).unwrap();

        assert_eq!(bindable.sql, "WHERE UPPER(DetailsColumn) LIKE @DetailsLike");
        assert_eq!(bindable.parameters.len(), 1);
        assert_eq!(bindable.parameters.get("DetailsLike"), Some(&Value::from("%SCOPED%")));
    }

    #[test]
    fn test_global_parameters_win_by_key() {
        let builder = Builder::<Todo>::new()
            .unwrap()
            .with_parameter("Id", 99)
            .with_parameter("Extra", "x");
        let bindable = builder.where_map([("Id", 1)]).unwrap();

        assert_eq!(bindable.sql, "WHERE Id = @Id");
        assert_eq!(bindable.parameters.get("Id"), Some(&Value::Int32(99)));
        assert_eq!(bindable.parameters.get("Extra"), Some(&Value::from("x")));

        let cleared = builder.clear_parameters();
        assert!(cleared.parameters().is_empty());
        assert_eq!(builder.parameters().len(), 2);
    }

    #[test]
    fn test_transform_runs_after_merge() {
        struct UpperDetails;

        impl ConstraintScope for UpperDetails {
            fn transform_constraints(&self, mut constraints: Vec<Constraint>) -> OrmResult<Vec<Constraint>> {
                for c in constraints.iter_mut().filter(|c| c.column == "Details") {
                    c.value = Value::String(c.value.to_string().to_uppercase());
                }
                Ok(constraints)
            }
        }

        let builder = Builder::<Todo>::with_scope(Arc::new(UpperDetails)).unwrap();
        let bindable = builder.where_map([("Details", "abc")]).unwrap();

        assert_eq!(bindable.sql, "WHERE DetailsColumn = @DetailsColumn");
        assert_eq!(bindable.parameters.get("DetailsColumn"), Some(&Value::from("ABC")));
    }

    #[test]
    fn test_consecutive_calls_are_independent() {
        let builder = Builder::<Todo>::new().unwrap();

        let first = builder.where_map([("Id", 1)]).unwrap();
        let second = builder.where_map([("Completed", false)]).unwrap();

        assert_eq!(first.sql, "WHERE Id = @Id");
        assert_eq!(second.sql, "WHERE Completed = @Completed");
        assert!(!second.parameters.contains_key("Id"));
    }

    #[test]
    fn test_where_from_json_text() {
        let builder = Builder::<Todo>::new().unwrap();
        let bindable = builder
            .where_from_json(r#"{"Completed": false, "Unknown": 1}"#)
            .unwrap();

        assert_eq!(bindable.sql, "WHERE Completed = @Completed");
        assert_eq!(bindable.parameters.get("Completed"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_conversion_failure_surfaces_from_where() {
        let builder = Builder::<Todo>::new().unwrap();
        let err = builder.where_map([("Id", "abc")]).unwrap_err();

        assert!(err.to_string().contains("Id"));
        assert!(err.to_string().contains("abc"));
    }
}
