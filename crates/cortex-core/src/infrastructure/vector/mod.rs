//! Vector store infrastructure implementations
//!
//! Concrete [`crate::domain::cache::VectorStore`] backed by SQLite.

mod repository;

pub use repository::SqliteVectorStore;
