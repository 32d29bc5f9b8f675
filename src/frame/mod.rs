//! Frame module
//!
//! Relational operators over in-memory Arrow tables: projection with
//! renaming, derived columns, equality filter, distinct rows and a left
//! equality join. Pipelines are written as chains of these operators
//! rather than per-row loops. Distinct and join are answered by an
//! embedded DuckDB database ([`SqlEngine`]).

mod engine;
mod join;
mod table;

pub use engine::SqlEngine;
pub use join::JoinSpec;
pub use table::Frame;
