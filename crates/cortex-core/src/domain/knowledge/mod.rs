//! Knowledge graph domain
//!
//! - **EntityExtractor**: finds candidate entity names in a query
//! - **RelationEdge**: a normalized `(head, TYPE, tail)` triple
//! - **FactCandidate**: an extractor's raw fact before alias resolution
//! - **GraphStore**: the storage contract implemented in
//!   [`crate::infrastructure::knowledge`]

mod extractor;
mod relation;
mod repository;

pub use extractor::{EntityExtractor, STOPWORDS};
pub use relation::{
    FactCandidate, HEAD_KEYS, RELATION_KEYS, RelationEdge, TAIL_KEYS, normalize_relation_type,
};
pub use repository::{GraphStats, GraphStore};
