//! Resolution of raw filter input into constraints
//!
//! The resolver knows the declared constrainables of one model and turns
//! key/value input (typed pairs or JSON) into concrete constraints. Keys that
//! name no constrainable property are dropped without error so generic
//! payloads such as query strings can be passed straight through.

use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::constraint::{Comparison, Constraint};
use crate::error::{ModelError, OrmResult};
use crate::model::{descriptor_of, Constrainable, ModelDescriptor, Property};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ConstraintResolver {
    descriptor: Arc<ModelDescriptor>,
}

impl ConstraintResolver {
    pub fn new(descriptor: Arc<ModelDescriptor>) -> Self {
        Self { descriptor }
    }

    /// Resolver over the cached descriptor of `C`
    pub fn for_model<C: Constrainable>() -> OrmResult<Self> {
        Ok(Self::new(descriptor_of::<C>()?))
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// One unvalued constraint per filterable property, in declaration order
    pub fn constrainables(&self) -> Vec<Constraint> {
        self.descriptor
            .properties()
            .iter()
            .filter(|p| p.is_constrainable())
            .map(unvalued)
            .collect()
    }

    /// A concrete constraint for `name`, or `None` when no filterable property matches
    pub fn constraint(&self, name: &str, raw: impl Into<Value>) -> Option<Constraint> {
        let property = self
            .descriptor
            .get_property(name)
            .filter(|p| p.is_constrainable())?;
        let raw = raw.into();

        let constraint = if property.is_custom() {
            let value = match raw {
                Value::Null => Value::Null,
                other => Value::String(other.to_string()),
            };
            unvalued(property).with_value(value)
        } else {
            let value = match property.pre_bind_transform() {
                Some(transform) => transform.apply(raw),
                None => raw,
            };
            unvalued(property).with_value(value)
        };

        Some(constraint)
    }

    /// Resolve key/value pairs, keeping input order and dropping unknown keys
    pub fn constraints<I, K, V>(&self, filters: I) -> Vec<Constraint>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        filters
            .into_iter()
            .filter_map(|(key, raw)| {
                let key = key.as_ref();
                let resolved = self.constraint(key, raw);
                if resolved.is_none() {
                    tracing::trace!(
                        "Ignoring filter '{}' unknown to {}",
                        key,
                        self.descriptor.table()
                    );
                }
                resolved
            })
            .collect()
    }

    /// Resolve a JSON object; scalars arrive as their string form and are
    /// coerced at bind time, JSON null stays a null
    pub fn constraints_from_json(&self, object: &JsonMap<String, JsonValue>) -> Vec<Constraint> {
        self.constraints(
            object
                .iter()
                .map(|(key, value)| (key.as_str(), json_filter_value(value))),
        )
    }

    /// Parse `text` as a JSON object and resolve it
    pub fn constraints_from_json_str(&self, text: &str) -> OrmResult<Vec<Constraint>> {
        let parsed: JsonValue = serde_json::from_str(text)?;
        match parsed {
            JsonValue::Object(object) => Ok(self.constraints_from_json(&object)),
            other => Err(ModelError::Serialization(format!(
                "Expected a JSON object of filters, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn unvalued(property: &Property) -> Constraint {
    if let Some(binder) = property.binder() {
        return Constraint::custom(property.name(), Arc::clone(binder));
    }

    let data_type = property
        .pre_bind_transform()
        .map(|t| t.data_type())
        .unwrap_or_else(|| property.data_type());

    Constraint::new(
        property.name(),
        property.database_column_name(),
        data_type,
        property.is_nullable(),
        Value::Null,
        Comparison::Equals,
    )
}

fn json_filter_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
