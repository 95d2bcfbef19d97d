//! Knowledge graph infrastructure implementations
//!
//! Concrete [`crate::domain::knowledge::GraphStore`] backed by SQLite.

mod repository;

pub use repository::SqliteGraphStore;
