//! Model metadata - the declared shape of a model type
//!
//! A type describes itself once through [`Constrainable::describe`]; the
//! resulting [`ModelDescriptor`] is validated and cached per type in a
//! process-wide registry. Descriptors drive constraint resolution, statement
//! generation, entity serialization and row hydration.

pub mod registry;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::backends::Row;
use crate::constraint::{ConstraintBinder, Parameters};
use crate::error::{ModelError, OrmResult};
use crate::security::validate_identifier;
use crate::value::{DataType, Value};

pub use registry::descriptor_of;

/// Connection used when a descriptor does not name one
pub const DEFAULT_CONNECTION: &str = "DefaultConnection";

/// A type whose properties can be filtered on
pub trait Constrainable: 'static {
    /// Declare the table and properties of this type
    fn describe() -> ModelDescriptor;
}

/// A constrainable type that also round-trips through the database.
///
/// Serde field names must match the descriptor's property names.
pub trait Model: Constrainable + Serialize + DeserializeOwned + Send + Sync {}

impl<T> Model for T where T: Constrainable + Serialize + DeserializeOwned + Send + Sync {}

/// Converts a raw filter value before it becomes a constraint's value
#[derive(Clone)]
pub struct PreBindTransform {
    data_type: DataType,
    function: Arc<dyn Fn(Value) -> Value + Send + Sync>,
}

impl PreBindTransform {
    /// `data_type` is the type the transformed value is bound as
    pub fn new<F>(data_type: DataType, function: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            data_type,
            function: Arc::new(function),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.function)(value)
    }
}

impl fmt::Debug for PreBindTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreBindTransform")
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// One declared property of a model
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    column: Option<String>,
    data_type: DataType,
    nullable: bool,
    key: bool,
    not_mapped: bool,
    ignore_select: bool,
    ignore_insert: bool,
    ignore_update: bool,
    transform: Option<PreBindTransform>,
    binder: Option<Arc<dyn ConstraintBinder>>,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            column: None,
            data_type,
            nullable: false,
            key: false,
            not_mapped: false,
            ignore_select: false,
            ignore_insert: false,
            ignore_update: false,
            transform: None,
            binder: None,
        }
    }

    /// A filter-only property whose constraints are rendered by `binder`
    pub fn custom(name: impl Into<String>, binder: Arc<dyn ConstraintBinder>) -> Self {
        let mut property = Self::new(name, DataType::Object);
        property.binder = Some(binder);
        property
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Store this property under a different column name
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Not a column at all; never selected, written or filtered
    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    pub fn ignore_select(mut self) -> Self {
        self.ignore_select = true;
        self
    }

    pub fn ignore_insert(mut self) -> Self {
        self.ignore_insert = true;
        self
    }

    pub fn ignore_update(mut self) -> Self {
        self.ignore_update = true;
        self
    }

    pub fn transform<F>(mut self, data_type: DataType, function: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(PreBindTransform::new(data_type, function));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database_column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn pre_bind_transform(&self) -> Option<&PreBindTransform> {
        self.transform.as_ref()
    }

    pub fn binder(&self) -> Option<&Arc<dyn ConstraintBinder>> {
        self.binder.as_ref()
    }

    pub fn is_custom(&self) -> bool {
        self.binder.is_some()
    }

    /// Eligible as a filter: mapped and selectable
    pub fn is_constrainable(&self) -> bool {
        !self.not_mapped && !self.ignore_select
    }

    /// Backed by a real column
    pub fn is_column(&self) -> bool {
        !self.not_mapped && !self.is_custom()
    }

    pub fn is_selectable(&self) -> bool {
        self.is_column() && !self.ignore_select
    }

    pub fn is_insertable(&self) -> bool {
        self.is_column() && !self.key && !self.ignore_insert
    }

    pub fn is_updatable(&self) -> bool {
        self.is_column() && !self.key && !self.ignore_update
    }
}

/// Table-level metadata plus the declared properties of a model
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    table: String,
    connection_name: String,
    insert_suffix: Option<String>,
    properties: Vec<Property>,
}

impl ModelDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            connection_name: DEFAULT_CONNECTION.to_string(),
            insert_suffix: None,
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Name of the configured connection string this model lives in
    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection_name = name.into();
        self
    }

    /// Raw SQL appended to every INSERT for this model
    pub fn insert_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.insert_suffix = Some(suffix.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn suffix(&self) -> Option<&str> {
        self.insert_suffix.as_deref()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Find a property by name (case-insensitive)
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Find a mapped property by its database column (case-insensitive)
    pub fn property_by_column(&self, column: &str) -> Option<&Property> {
        self.properties
            .iter()
            .filter(|p| p.is_column())
            .find(|p| p.database_column_name().eq_ignore_ascii_case(column))
    }

    /// Properties flagged as keys, falling back to a property named `Id`
    pub fn key_properties(&self) -> Vec<&Property> {
        let flagged: Vec<&Property> = self.properties.iter().filter(|p| p.key).collect();
        if !flagged.is_empty() {
            return flagged;
        }

        self.properties
            .iter()
            .filter(|p| p.is_column() && p.name.eq_ignore_ascii_case("Id"))
            .collect()
    }

    /// Key properties, or `MissingPrimaryKey` when the model has none
    pub fn require_keys(&self) -> OrmResult<Vec<&Property>> {
        let keys = self.key_properties();
        if keys.is_empty() {
            return Err(ModelError::MissingPrimaryKey(self.table.clone()));
        }
        Ok(keys)
    }

    pub fn selectable(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_selectable())
    }

    /// Insertable columns; keys found by the `Id` fallback are excluded too
    pub fn insertable(&self) -> Vec<&Property> {
        let keys = self.key_properties();
        self.properties
            .iter()
            .filter(|p| p.is_insertable() && !keys.iter().any(|k| std::ptr::eq(*k, *p)))
            .collect()
    }

    pub fn updatable(&self) -> Vec<&Property> {
        let keys = self.key_properties();
        self.properties
            .iter()
            .filter(|p| p.is_updatable() && !keys.iter().any(|k| std::ptr::eq(*k, *p)))
            .collect()
    }

    /// Check every name that will reach SQL text
    pub fn validate(&self) -> OrmResult<()> {
        validate_identifier(&self.table)?;

        for (index, property) in self.properties.iter().enumerate() {
            validate_identifier(&property.name)?;
            validate_identifier(property.database_column_name())?;
            if let Some(binder) = property.binder() {
                for column in binder.columns() {
                    validate_identifier(column)?;
                }
            }

            let duplicate = self.properties[..index]
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(&property.name));
            if duplicate {
                return Err(ModelError::Validation(format!(
                    "Property '{}' is declared twice on '{}'",
                    property.name, self.table
                )));
            }
        }

        Ok(())
    }

    /// Column values of an entity keyed by property name, coerced to each declared type
    pub fn values_of<M: Serialize>(&self, entity: &M) -> OrmResult<Parameters> {
        let json = serde_json::to_value(entity)?;
        let object = json.as_object().ok_or_else(|| {
            ModelError::Serialization(format!(
                "Entities of '{}' must serialize to an object",
                self.table
            ))
        })?;

        let mut values = Parameters::new();
        for property in self.properties.iter().filter(|p| p.is_column()) {
            let raw = object
                .get(&property.name)
                .or_else(|| {
                    object
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&property.name))
                        .map(|(_, v)| v)
                })
                .map(Value::from_json)
                .unwrap_or(Value::Null);

            let value = coerce_property(property, raw)?;
            values.insert(property.name.clone(), value);
        }

        Ok(values)
    }

    /// Build a model from a row whose columns are aliased to property names
    pub fn hydrate<M: DeserializeOwned>(&self, row: &Row) -> OrmResult<M> {
        let mut object = serde_json::Map::new();

        for property in self.selectable() {
            let raw = row.get(&property.name).cloned().unwrap_or(Value::Null);
            let value = coerce_property(property, raw)?;
            object.insert(property.name.clone(), value.to_json());
        }

        serde_json::from_value(JsonValue::Object(object)).map_err(|e| {
            ModelError::Serialization(format!("Failed to hydrate row of '{}': {}", self.table, e))
        })
    }
}

fn coerce_property(property: &Property, raw: Value) -> OrmResult<Value> {
    raw.coerce(property.data_type)
        .map_err(|reason| ModelError::Conversion {
            column: property.database_column_name().to_string(),
            value: raw.to_string(),
            data_type: property.data_type.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::LikeBinder;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Widget {
        id: i32,
        label: Option<String>,
        active: bool,
    }

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new("Widgets")
            .property(Property::new("Id", DataType::Int32).key())
            .property(Property::new("Label", DataType::String).nullable().column("LabelText"))
            .property(Property::new("Active", DataType::Boolean))
            .property(Property::new("Scratch", DataType::String).not_mapped())
    }

    #[test]
    fn test_column_override() {
        let d = descriptor();
        assert_eq!(d.get_property("label").unwrap().database_column_name(), "LabelText");
        assert_eq!(d.get_property("Active").unwrap().database_column_name(), "Active");
        assert_eq!(d.property_by_column("labeltext").unwrap().name(), "Label");
    }

    #[test]
    fn test_key_falls_back_to_id() {
        let d = ModelDescriptor::new("Things")
            .property(Property::new("ID", DataType::Int64))
            .property(Property::new("Name", DataType::String));
        let keys = d.key_properties();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name(), "ID");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let d = ModelDescriptor::new("Things").property(Property::new("Name", DataType::String));
        assert_eq!(
            d.require_keys().err(),
            Some(ModelError::MissingPrimaryKey("Things".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_unsafe_names() {
        assert!(descriptor().validate().is_ok());

        let bad = ModelDescriptor::new("Widgets")
            .property(Property::new("Id", DataType::Int32).column("Id; DROP TABLE x"));
        assert!(bad.validate().is_err());

        let duplicated = ModelDescriptor::new("Widgets")
            .property(Property::new("Id", DataType::Int32))
            .property(Property::new("id", DataType::Int32));
        assert!(duplicated.validate().is_err());

        let bad_target = ModelDescriptor::new("Widgets").property(Property::custom(
            "LabelLike",
            Arc::new(LikeBinder::new("Label) OR (1=1")),
        ));
        assert!(bad_target.validate().is_err());

        let dollar = ModelDescriptor::new("Widgets").property(Property::new("Price$", DataType::Int32));
        assert!(dollar.validate().is_err());

        let reserved = ModelDescriptor::new("Widgets")
            .property(Property::new("Group", DataType::String))
            .property(Property::custom("GroupLike", Arc::new(LikeBinder::new("Group"))));
        assert!(reserved.validate().is_ok());
    }

    #[test]
    fn test_values_of_entity() {
        let widget = Widget {
            id: 3,
            label: None,
            active: true,
        };
        let values = descriptor().values_of(&widget).unwrap();

        assert_eq!(values.get("Id"), Some(&Value::Int32(3)));
        assert_eq!(values.get("Label"), Some(&Value::Null));
        assert_eq!(values.get("Active"), Some(&Value::Bool(true)));
        assert!(!values.contains_key("Scratch"));
    }

    #[test]
    fn test_hydrate_coerces_storage_types() {
        let row = Row::new(vec![
            ("Id".to_string(), Value::Int64(3)),
            ("Label".to_string(), Value::from("hello")),
            ("Active".to_string(), Value::Int64(1)),
        ]);

        let widget: Widget = descriptor().hydrate(&row).unwrap();
        assert_eq!(
            widget,
            Widget {
                id: 3,
                label: Some("hello".to_string()),
                active: true,
            }
        );
    }
}
