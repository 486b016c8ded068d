//! # scoperepo: metadata-driven scoped repositories
//!
//! Models describe their properties once through [`Constrainable`]. Filter
//! payloads (maps or JSON objects) are resolved against that description into
//! typed [`Constraint`]s, merged with the repository's scoping rules and bound
//! into a parameterized WHERE clause. Repositories run the generated
//! statements through a [`QueryExecutor`] and hydrate rows back into models.

pub mod backends;
pub mod builder;
pub mod config;
pub mod constrainable;
pub mod constraint;
pub mod error;
pub mod logging;
pub mod model;
pub mod repository;
pub mod security;
pub mod statements;
pub mod value;


// Re-export core traits and types
pub use backends::{compile_named, CompiledQuery, ExecuteResult, QueryExecutor, Row, SqlDialect, SqliteExecutor};
pub use builder::{bind_constraints, merge_constraints, scope_fn, Bindable, Builder, ConstraintScope, Unscoped};
pub use config::{ConfigError, DatabaseConfig, PoolConfig};
pub use constrainable::ConstraintResolver;
pub use constraint::{
    Comparison, Constraint, ConstraintBinder, ConstraintListExt, LikeBinder, NoQueryBinder, Parameters, SqlBuilder,
};
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use logging::QueryLogger;
pub use model::{descriptor_of, Constrainable, Model, ModelDescriptor, PreBindTransform, Property};
pub use repository::{BasicQuery, QueryFacts, ReadOnlyRepository, Repository};
pub use statements::{OrderDirection, Statements};
pub use value::{DataType, Value};
