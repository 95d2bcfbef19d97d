//! Infrastructure layer
//!
//! SQLite implementations of the domain storage contracts.

pub mod knowledge;
pub mod vector;

pub use knowledge::SqliteGraphStore;
pub use vector::SqliteVectorStore;
