//! Repositories over one model
//!
//! [`BasicQuery`] runs generated statements without any scoping.
//! [`ReadOnlyRepository`] adds the WHERE builder for reads and counts, and
//! [`Repository`] adds scoped inserts, updates and deletes on top of it.

pub mod basic;
pub mod crud;
pub mod read_only;

pub use basic::BasicQuery;
pub use crud::{QueryFacts, Repository};
pub use read_only::ReadOnlyRepository;
