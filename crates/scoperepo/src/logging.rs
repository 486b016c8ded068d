//! Query logging hook
//!
//! Every executed statement goes through a `QueryLogger`. It always emits a
//! `tracing` event; callers may additionally register hooks to capture the
//! SQL text and the parameter set.

use std::fmt;
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::constraint::Parameters;

pub type QueryHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type ParametersHook = Arc<dyn Fn(&Parameters) + Send + Sync>;

#[derive(Clone, Default)]
pub struct QueryLogger {
    on_query: Option<QueryHook>,
    on_parameters: Option<ParametersHook>,
    trace_parameters: bool,
}

impl QueryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            trace_parameters: config.log_parameters,
            ..Self::default()
        }
    }

    /// Receive the SQL text of every statement
    pub fn on_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_query = Some(Arc::new(hook));
        self
    }

    /// Receive the parameters bound to every statement
    pub fn on_parameters<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Parameters) + Send + Sync + 'static,
    {
        self.on_parameters = Some(Arc::new(hook));
        self
    }

    pub fn with_parameter_tracing(mut self, enabled: bool) -> Self {
        self.trace_parameters = enabled;
        self
    }

    pub fn traces_parameters(&self) -> bool {
        self.trace_parameters
    }

    pub fn log_query(&self, operation: &str, sql: &str) {
        tracing::debug!(operation, "{}", sql);

        if let Some(hook) = &self.on_query {
            hook(sql);
        }
    }

    pub fn log_parameters(&self, parameters: &Parameters) {
        if self.trace_parameters {
            tracing::debug!(count = parameters.len(), "parameters: {:?}", parameters);
        }

        if let Some(hook) = &self.on_parameters {
            hook(parameters);
        }
    }
}

impl fmt::Debug for QueryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLogger")
            .field("on_query", &self.on_query.is_some())
            .field("on_parameters", &self.on_parameters.is_some())
            .field("trace_parameters", &self.trace_parameters)
            .finish()
    }
}
