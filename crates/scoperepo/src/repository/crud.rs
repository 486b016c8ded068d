//! Scoped writes
//!
//! Inserts and updates first inspect the entity: the scope sees the entity's
//! key constraints and its constraints are bound on their own. Values a scope
//! binds replace the entity's values for the same column, so an entity cannot
//! write itself out of its scope. Scoped updates and deletes also carry the
//! scope's predicates, so rows outside the scope are never touched.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::backends::QueryExecutor;
use crate::builder::{bind_constraints, Bindable, ConstraintScope};
use crate::config::DatabaseConfig;
use crate::constraint::{Constraint, Parameters};
use crate::error::OrmResult;
use crate::logging::QueryLogger;
use crate::model::{Constrainable, Model};
use crate::repository::ReadOnlyRepository;
use crate::value::Value;

/// What a write learned about its entity before touching the database
#[derive(Debug, Clone, Default)]
pub struct QueryFacts {
    pub id_fields: Vec<(String, Value)>,
    pub id_constraints: Vec<Constraint>,
    pub scoped_constraints: Vec<Constraint>,
    /// Key constraints merged with the scope
    pub all_constraints: Vec<Constraint>,
    /// The scope's predicates and parameters alone
    pub scoped_bindings: Bindable,
    /// Entity values keyed by property name, with scoped values applied
    pub sanitized_values: Parameters,
}

pub struct Repository<M: Model, C: Constrainable = M> {
    read: ReadOnlyRepository<M, C>,
}

impl<M: Model, C: Constrainable> Clone for Repository<M, C> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
        }
    }
}

impl<M: Model, C: Constrainable> fmt::Debug for Repository<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").field("read", &self.read).finish()
    }
}

impl<M: Model, C: Constrainable> Deref for Repository<M, C> {
    type Target = ReadOnlyRepository<M, C>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<M: Model, C: Constrainable> Repository<M, C> {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> OrmResult<Self> {
        Ok(Self {
            read: ReadOnlyRepository::new(executor)?,
        })
    }

    pub fn with_scope(executor: Arc<dyn QueryExecutor>, scope: Arc<dyn ConstraintScope>) -> OrmResult<Self> {
        Ok(Self {
            read: ReadOnlyRepository::with_scope(executor, scope)?,
        })
    }

    /// Open the model's named connection from `config`, logging as it asks
    pub async fn connect(config: &DatabaseConfig, scope: Arc<dyn ConstraintScope>) -> OrmResult<Self> {
        Ok(Self {
            read: ReadOnlyRepository::connect(config, scope).await?,
        })
    }

    pub fn with_logger(self, logger: QueryLogger) -> Self {
        Self {
            read: self.read.with_logger(logger),
        }
    }

    pub fn apply_scoped_constraints(&self) -> Self {
        Self {
            read: self.read.apply_scoped_constraints(),
        }
    }

    /// A copy of this repository that skips scoping; the receiver stays scoped
    pub fn remove_scoped_constraints(&self) -> Self {
        Self {
            read: self.read.remove_scoped_constraints(),
        }
    }

    pub fn with_parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            read: self.read.with_parameter(name, value),
        }
    }

    pub fn clear_parameters(&self) -> Self {
        Self {
            read: self.read.clear_parameters(),
        }
    }

    /// Gather keys, scope and sanitized values for `entity`
    pub fn inspect(&self, entity: &M) -> OrmResult<QueryFacts> {
        let descriptor = self.basic().descriptor();
        let builder = self.builder();
        let values = descriptor.values_of(entity)?;

        let id_fields: Vec<(String, Value)> = descriptor
            .key_properties()
            .into_iter()
            .map(|key| {
                let value = values.get(key.name()).cloned().unwrap_or_default();
                (key.name().to_string(), value)
            })
            .collect();
        let id_constraints = builder.resolver().constraints(id_fields.iter().cloned());

        let scoped_constraints = builder.scoped_constraints(&id_constraints)?;
        let all_constraints = builder.merge_constraints(id_constraints.clone(), scoped_constraints.clone());
        let scoped_bindings = bind_constraints(scoped_constraints.clone())?;

        let mut sanitized_values = values;
        for constraint in &scoped_constraints {
            let Some(bound) = scoped_bindings.parameters.get(&constraint.database_column_name) else {
                continue;
            };
            let property = descriptor
                .property_by_column(&constraint.database_column_name)
                .or_else(|| descriptor.get_property(&constraint.column))
                .filter(|p| p.is_column());
            if let Some(property) = property {
                tracing::trace!(
                    "Scope sets {}.{} to {}",
                    descriptor.table(),
                    property.name(),
                    bound
                );
                sanitized_values.insert(property.name().to_string(), bound.clone());
            }
        }

        Ok(QueryFacts {
            id_fields,
            id_constraints,
            scoped_constraints,
            all_constraints,
            scoped_bindings,
            sanitized_values,
        })
    }

    /// Insert `entity`; returns the generated row id
    pub async fn insert(&self, entity: &M) -> OrmResult<Option<i64>> {
        if !self.applies_scoped_constraints() {
            return self.basic().insert(entity).await;
        }

        let facts = self.inspect(entity)?;
        self.basic().insert_values(&facts.sanitized_values).await
    }

    /// Update `entity` by key; scoped updates only reach rows inside the scope
    pub async fn update(&self, entity: &M) -> OrmResult<u64> {
        if !self.applies_scoped_constraints() {
            return self.basic().update(entity).await;
        }

        let facts = self.inspect(entity)?;
        let mut parameters = facts.sanitized_values;
        parameters.extend(facts.scoped_bindings.parameters);

        self.basic()
            .update_values(&parameters, &facts.scoped_bindings.sql)
            .await
    }

    /// Delete by key; scoped deletes only reach rows inside the scope
    pub async fn delete(&self, id: impl Into<Value>) -> OrmResult<u64> {
        if !self.applies_scoped_constraints() {
            return self.basic().delete_by_id(id).await;
        }

        let bindable = self.builder().where_constraints(self.id_constraints(id)?)?;
        self.basic().delete_list(&bindable).await
    }
}
