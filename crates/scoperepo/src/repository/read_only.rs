//! Scoped read access
//!
//! `M` is the model rows hydrate into; `C` is the constraints model filters
//! are resolved against. They are usually the same type, but a separate
//! constraints model can declare filter-only properties such as pattern
//! searches.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::backends::{QueryExecutor, SqliteExecutor};
use crate::builder::{Bindable, Builder, ConstraintScope};
use crate::config::DatabaseConfig;
use crate::constraint::Constraint;
use crate::error::{ModelError, OrmResult};
use crate::logging::QueryLogger;
use crate::model::{Constrainable, Model};
use crate::repository::BasicQuery;
use crate::value::Value;

pub struct ReadOnlyRepository<M: Model, C: Constrainable = M> {
    builder: Builder<C>,
    basic: BasicQuery<M>,
}

impl<M: Model, C: Constrainable> Clone for ReadOnlyRepository<M, C> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            basic: self.basic.clone(),
        }
    }
}

impl<M: Model, C: Constrainable> fmt::Debug for ReadOnlyRepository<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyRepository")
            .field("builder", &self.builder)
            .field("basic", &self.basic)
            .finish()
    }
}

impl<M: Model, C: Constrainable> ReadOnlyRepository<M, C> {
    /// Repository without scoping rules
    pub fn new(executor: Arc<dyn QueryExecutor>) -> OrmResult<Self> {
        Self::with_scope(executor, Arc::new(crate::builder::Unscoped))
    }

    pub fn with_scope(executor: Arc<dyn QueryExecutor>, scope: Arc<dyn ConstraintScope>) -> OrmResult<Self> {
        Ok(Self {
            builder: Builder::with_scope(scope)?,
            basic: BasicQuery::new(executor, QueryLogger::new())?,
        })
    }

    /// Open the model's named connection from `config`, logging as it asks
    pub async fn connect(config: &DatabaseConfig, scope: Arc<dyn ConstraintScope>) -> OrmResult<Self> {
        let executor = SqliteExecutor::for_model::<M>(config).await?;
        Ok(Self::with_scope(Arc::new(executor), scope)?.with_logger(QueryLogger::from_config(config)))
    }

    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.basic.set_logger(logger);
        self
    }

    /// Unscoped access to the generated statements
    pub fn basic(&self) -> &BasicQuery<M> {
        &self.basic
    }

    pub fn builder(&self) -> &Builder<C> {
        &self.builder
    }

    pub fn applies_scoped_constraints(&self) -> bool {
        self.builder.applies_scoped_constraints()
    }

    pub fn apply_scoped_constraints(&self) -> Self {
        Self {
            builder: self.builder.apply_scoped_constraints(),
            basic: self.basic.clone(),
        }
    }

    /// A copy of this repository that skips scoping; the receiver stays scoped
    pub fn remove_scoped_constraints(&self) -> Self {
        Self {
            builder: self.builder.remove_scoped_constraints(),
            basic: self.basic.clone(),
        }
    }

    pub fn with_parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            builder: self.builder.with_parameter(name, value),
            basic: self.basic.clone(),
        }
    }

    pub fn clear_parameters(&self) -> Self {
        Self {
            builder: self.builder.clear_parameters(),
            basic: self.basic.clone(),
        }
    }

    /// Names of the model's key properties
    pub fn id_fields(&self) -> Vec<String> {
        self.basic
            .descriptor()
            .key_properties()
            .into_iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Every key property paired with `id`
    pub fn populated_id_fields(&self, id: impl Into<Value>) -> Vec<(String, Value)> {
        let id = id.into();
        self.id_fields()
            .into_iter()
            .map(|field| (field, id.clone()))
            .collect()
    }

    /// Key constraints for `id` resolved against the constraints model.
    ///
    /// A key the constraints model cannot resolve would silently widen the
    /// filter, so it is reported as a missing key instead.
    pub(crate) fn id_constraints(&self, id: impl Into<Value>) -> OrmResult<Vec<Constraint>> {
        let fields = self.populated_id_fields(id);
        let table = self.basic.descriptor().table().to_string();

        if fields.is_empty() {
            return Err(ModelError::MissingPrimaryKey(table));
        }
        if fields.iter().any(|(_, value)| value.is_null()) {
            return Err(ModelError::MissingPrimaryKey(table));
        }

        let constraints = self.builder.resolver().constraints(fields.iter().cloned());
        if constraints.len() != fields.len() {
            return Err(ModelError::MissingPrimaryKey(table));
        }

        Ok(constraints)
    }

    async fn get_bindable(&self, bindable: Bindable) -> OrmResult<Vec<M>> {
        self.basic.get_list(&bindable).await
    }

    /// Fetch one row by key, honoring the scope
    pub async fn get(&self, id: impl Into<Value>) -> OrmResult<Option<M>> {
        let bindable = self.builder.where_constraints(self.id_constraints(id)?)?;
        Ok(self.get_bindable(bindable).await?.into_iter().next())
    }

    pub async fn get_all(&self) -> OrmResult<Vec<M>> {
        self.get_where(Vec::new()).await
    }

    pub async fn get_where(&self, constraints: Vec<Constraint>) -> OrmResult<Vec<M>> {
        let bindable = self.builder.where_constraints(constraints)?;
        self.get_bindable(bindable).await
    }

    pub async fn get_map<I, K, V>(&self, filters: I) -> OrmResult<Vec<M>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let bindable = self.builder.where_map(filters)?;
        self.get_bindable(bindable).await
    }

    pub async fn get_json(&self, object: &JsonMap<String, JsonValue>) -> OrmResult<Vec<M>> {
        let bindable = self.builder.where_json(object)?;
        self.get_bindable(bindable).await
    }

    pub async fn get_json_str(&self, json: &str) -> OrmResult<Vec<M>> {
        let bindable = self.builder.where_from_json(json)?;
        self.get_bindable(bindable).await
    }

    pub async fn get_list_paged(
        &self,
        page_number: u32,
        rows_per_page: u32,
        constraints: Vec<Constraint>,
        order_by: &str,
    ) -> OrmResult<Vec<M>> {
        let bindable = self.builder.where_constraints(constraints)?;
        self.basic
            .get_list_paged(page_number, rows_per_page, &bindable, order_by)
            .await
    }

    pub async fn get_list_paged_map<I, K, V>(
        &self,
        page_number: u32,
        rows_per_page: u32,
        filters: I,
        order_by: &str,
    ) -> OrmResult<Vec<M>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let bindable = self.builder.where_map(filters)?;
        self.basic
            .get_list_paged(page_number, rows_per_page, &bindable, order_by)
            .await
    }

    pub async fn get_list_paged_json_str(
        &self,
        page_number: u32,
        rows_per_page: u32,
        json: &str,
        order_by: &str,
    ) -> OrmResult<Vec<M>> {
        let bindable = self.builder.where_from_json(json)?;
        self.basic
            .get_list_paged(page_number, rows_per_page, &bindable, order_by)
            .await
    }

    pub async fn get_record_count(&self) -> OrmResult<i64> {
        self.get_record_count_where(Vec::new()).await
    }

    pub async fn get_record_count_where(&self, constraints: Vec<Constraint>) -> OrmResult<i64> {
        let bindable = self.builder.where_constraints(constraints)?;
        self.basic.record_count(&bindable).await
    }

    pub async fn get_record_count_map<I, K, V>(&self, filters: I) -> OrmResult<i64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let bindable = self.builder.where_map(filters)?;
        self.basic.record_count(&bindable).await
    }
}
