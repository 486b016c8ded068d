//! Lookup and enforcement helpers over resolved constraint lists

use crate::constraint::Constraint;
use crate::error::{ModelError, OrmResult};

/// Helpers for scopes and transforms working on a list of constraints
pub trait ConstraintListExt {
    /// Find a constraint by its logical column (case-insensitive)
    fn get_by_column(&self, column: &str) -> Option<&Constraint>;

    fn get_by_column_mut(&mut self, column: &str) -> Option<&mut Constraint>;

    /// Return the string form of a required constraint's value, or fail with
    /// `MissingRequiredField` when it is absent or blank
    fn ensure_constraint_exists(&self, column: &str) -> OrmResult<String>;

    /// Apply `transform` to the named constraint; returns whether one was found
    fn transform_constraint<F>(&mut self, column: &str, transform: F) -> bool
    where
        F: FnOnce(&mut Constraint);
}

impl ConstraintListExt for [Constraint] {
    fn get_by_column(&self, column: &str) -> Option<&Constraint> {
        self.iter().find(|c| c.column.eq_ignore_ascii_case(column))
    }

    fn get_by_column_mut(&mut self, column: &str) -> Option<&mut Constraint> {
        self.iter_mut().find(|c| c.column.eq_ignore_ascii_case(column))
    }

    fn ensure_constraint_exists(&self, column: &str) -> OrmResult<String> {
        let value = self
            .get_by_column(column)
            .map(|c| c.value.to_string())
            .unwrap_or_default();

        if value.trim().is_empty() {
            return Err(ModelError::MissingRequiredField(column.to_string()));
        }

        Ok(value)
    }

    fn transform_constraint<F>(&mut self, column: &str, transform: F) -> bool
    where
        F: FnOnce(&mut Constraint),
    {
        match self.get_by_column_mut(column) {
            Some(constraint) => {
                transform(constraint);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Comparison;
    use crate::value::{DataType, Value};

    fn constraints() -> Vec<Constraint> {
        vec![
            Constraint::new("Id", "Id", DataType::Int32, false, 1, Comparison::Equals),
            Constraint::new("StringProperty", "StringColumn", DataType::String, false, "Value", Comparison::Equals),
            Constraint::new("IntProperty", "IntColumn", DataType::Int32, false, 4, Comparison::Equals),
            Constraint::new("Blank", "Blank", DataType::String, false, "  ", Comparison::Equals),
        ]
    }

    #[test]
    fn test_get_by_column_ignores_case() {
        let list = constraints();

        let found = list.get_by_column("stringproperty").unwrap();
        assert_eq!(found.value, Value::from("Value"));
        assert!(list.get_by_column("InvalidColumn").is_none());
    }

    #[test]
    fn test_ensure_constraint_exists() {
        let list = constraints();

        assert_eq!(list.ensure_constraint_exists("StringProperty").unwrap(), "Value");
        assert_eq!(
            list.ensure_constraint_exists("InvalidColumn"),
            Err(ModelError::MissingRequiredField("InvalidColumn".to_string()))
        );
        assert!(list.ensure_constraint_exists("Blank").is_err());
    }

    #[test]
    fn test_transform_constraint() {
        let mut list = constraints();

        let found = list.transform_constraint("IntProperty", |c| {
            if let Value::Int32(n) = c.value {
                c.value = Value::Int32(n * 2);
            }
        });
        assert!(found);
        assert_eq!(list.get_by_column("IntProperty").unwrap().value, Value::Int32(8));

        let before = list.clone();
        assert!(!list.transform_constraint("InvalidProperty", |c| c.value = Value::Null));
        assert_eq!(list, before);
    }
}
