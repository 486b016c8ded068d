//! Database Backend Abstractions
//!
//! The repository layer only depends on [`QueryExecutor`]; drivers live in
//! their own modules.

pub mod core;
pub mod sqlite;

// Re-export core traits and types
pub use core::*;
pub use sqlite::SqliteExecutor;
