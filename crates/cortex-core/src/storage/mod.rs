//! Storage layer - SQLite connection pool and schema migrations
//!
//! Both concrete stores (the vector collection behind the semantic cache and
//! the knowledge graph) live in one SQLite database.
//!
//! # Usage
//!
//! ```ignore
//! use cortex_core::storage::Database;
//!
//! // In-memory database for tests
//! let db = Database::in_memory().await?;
//!
//! // File-backed database under the config directory
//! let db = Database::default().await?;
//! ```

pub mod database;
pub mod migrations;

pub use database::{Database, DatabaseConfig, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
