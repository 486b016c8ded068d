//! Unscoped statement execution for one model
//!
//! `BasicQuery` renders statements from the model's descriptor, runs them on
//! an executor and hydrates rows. It never consults a scope; scoped
//! repositories build their WHERE fragments first and hand them in.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::backends::{ExecuteResult, QueryExecutor, Row};
use crate::builder::Bindable;
use crate::constraint::Parameters;
use crate::error::{ModelError, OrmResult};
use crate::logging::QueryLogger;
use crate::model::{descriptor_of, Model, ModelDescriptor};
use crate::statements::Statements;
use crate::value::{DataType, Value};

pub struct BasicQuery<M: Model> {
    descriptor: Arc<ModelDescriptor>,
    executor: Arc<dyn QueryExecutor>,
    logger: QueryLogger,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for BasicQuery<M> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            executor: Arc::clone(&self.executor),
            logger: self.logger.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for BasicQuery<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicQuery")
            .field("table", &self.descriptor.table())
            .field("dialect", &self.executor.dialect())
            .field("logger", &self.logger)
            .finish()
    }
}

impl<M: Model> BasicQuery<M> {
    pub fn new(executor: Arc<dyn QueryExecutor>, logger: QueryLogger) -> OrmResult<Self> {
        Ok(Self {
            descriptor: descriptor_of::<M>()?,
            executor,
            logger,
            _model: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    pub fn logger(&self) -> &QueryLogger {
        &self.logger
    }

    pub(crate) fn set_logger(&mut self, logger: QueryLogger) {
        self.logger = logger;
    }

    pub fn statements(&self) -> Statements<'_> {
        Statements::new(&self.descriptor, self.executor.dialect())
    }

    async fn fetch(&self, operation: &str, sql: &str, parameters: &Parameters) -> OrmResult<Vec<Row>> {
        self.logger.log_query(operation, sql);
        self.logger.log_parameters(parameters);
        self.executor.fetch_all(sql, parameters).await
    }

    async fn run(&self, operation: &str, sql: &str, parameters: &Parameters) -> OrmResult<ExecuteResult> {
        self.logger.log_query(operation, sql);
        self.logger.log_parameters(parameters);
        self.executor.execute(sql, parameters).await
    }

    fn hydrate_all(&self, rows: Vec<Row>) -> OrmResult<Vec<M>> {
        rows.iter().map(|row| self.descriptor.hydrate(row)).collect()
    }

    /// Every key property bound to `id`, coerced to the key's type
    pub fn key_parameters(&self, id: impl Into<Value>) -> OrmResult<Parameters> {
        let id = id.into();
        let mut parameters = Parameters::new();

        for key in self.descriptor.require_keys()? {
            let value = id.coerce(key.data_type()).map_err(|reason| ModelError::Conversion {
                column: key.database_column_name().to_string(),
                value: id.to_string(),
                data_type: key.data_type().to_string(),
                reason,
            })?;
            if value.is_null() {
                return Err(ModelError::MissingPrimaryKey(self.descriptor.table().to_string()));
            }
            parameters.insert(key.name().to_string(), value);
        }

        Ok(parameters)
    }

    pub async fn get_list(&self, bindable: &Bindable) -> OrmResult<Vec<M>> {
        let sql = self.statements().select(&bindable.sql);
        let rows = self.fetch("GetList", &sql, &bindable.parameters).await?;
        self.hydrate_all(rows)
    }

    pub async fn get_list_paged(
        &self,
        page_number: u32,
        rows_per_page: u32,
        bindable: &Bindable,
        order_by: &str,
    ) -> OrmResult<Vec<M>> {
        let sql = self
            .statements()
            .select_paged(&bindable.sql, order_by, page_number, rows_per_page)?;
        let rows = self.fetch("GetListPaged", &sql, &bindable.parameters).await?;
        self.hydrate_all(rows)
    }

    pub async fn record_count(&self, bindable: &Bindable) -> OrmResult<i64> {
        let sql = self.statements().count(&bindable.sql);
        let rows = self.fetch("RecordCount", &sql, &bindable.parameters).await?;

        let count = rows
            .first()
            .and_then(|row| row.get_by_index(0))
            .cloned()
            .unwrap_or(Value::Int64(0));
        match count.coerce(DataType::Int64) {
            Ok(Value::Int64(n)) => Ok(n),
            _ => Err(ModelError::Query(format!("Unexpected record count '{}'", count))),
        }
    }

    /// Fetch by key alone
    pub async fn get(&self, id: impl Into<Value>) -> OrmResult<Option<M>> {
        let parameters = self.key_parameters(id)?;
        let statements = self.statements();
        let sql = statements.select(&statements.where_with_key("")?);

        let rows = self.fetch("Get", &sql, &parameters).await?;
        Ok(self.hydrate_all(rows)?.into_iter().next())
    }

    /// Insert `values` keyed by property name; returns the generated row id
    pub async fn insert_values(&self, values: &Parameters) -> OrmResult<Option<i64>> {
        let sql = self.statements().insert();
        let result = self.run("Insert", &sql, values).await?;
        Ok(result.last_insert_id)
    }

    pub async fn insert(&self, entity: &M) -> OrmResult<Option<i64>> {
        let values = self.descriptor.values_of(entity)?;
        self.insert_values(&values).await
    }

    /// Update the row addressed by the key values in `values`, further restricted by `where_clause`
    pub async fn update_values(&self, values: &Parameters, where_clause: &str) -> OrmResult<u64> {
        for key in self.descriptor.require_keys()? {
            if values.get(key.name()).map_or(true, Value::is_null) {
                return Err(ModelError::MissingPrimaryKey(self.descriptor.table().to_string()));
            }
        }

        let statements = self.statements();
        let sql = statements.update(&statements.where_with_key(where_clause)?)?;
        let result = self.run("Update", &sql, values).await?;
        Ok(result.rows_affected)
    }

    /// Update by key alone
    pub async fn update(&self, entity: &M) -> OrmResult<u64> {
        let values = self.descriptor.values_of(entity)?;
        self.update_values(&values, "").await
    }

    /// Delete every row matched by `bindable`
    pub async fn delete_list(&self, bindable: &Bindable) -> OrmResult<u64> {
        let sql = self.statements().delete(&bindable.sql);
        let result = self.run("Delete", &sql, &bindable.parameters).await?;
        Ok(result.rows_affected)
    }

    /// Delete by key alone
    pub async fn delete_by_id(&self, id: impl Into<Value>) -> OrmResult<u64> {
        let parameters = self.key_parameters(id)?;
        let statements = self.statements();
        let sql = statements.delete(&statements.where_with_key("")?);

        let result = self.run("Delete", &sql, &parameters).await?;
        Ok(result.rows_affected)
    }
}
