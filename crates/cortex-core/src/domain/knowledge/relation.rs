//! Relation edges and raw fact candidates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Alias keys for the head entity, in resolution order
pub const HEAD_KEYS: &[&str] = &["head", "subject", "entity1"];

/// Alias keys for the tail entity, in resolution order
pub const TAIL_KEYS: &[&str] = &["tail", "object", "entity2"];

/// Alias keys for the relation label, in resolution order
pub const RELATION_KEYS: &[&str] = &["relation", "predicate", "relationship", "type"];

/// Canonical relation label: trimmed, uppercase, spaces as underscores
///
/// `"founded by"` becomes `FOUNDED_BY`. Runs of whitespace collapse to a
/// single underscore.
pub fn normalize_relation_type(relation: &str) -> String {
    relation
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// A directed, typed edge between two entities
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEdge {
    pub head: String,
    pub relation_type: String,
    pub tail: String,
}

impl RelationEdge {
    /// Build a normalized edge, rejecting blank parts
    pub fn new(head: &str, relation_type: &str, tail: &str) -> Result<Self> {
        let head = head.trim();
        let tail = tail.trim();
        let relation_type = normalize_relation_type(relation_type);

        if head.is_empty() || tail.is_empty() {
            return Err(Error::InvalidInput(
                "Relation endpoints must be non-empty".to_string(),
            ));
        }
        if relation_type.is_empty() {
            return Err(Error::InvalidInput(
                "Relation type must be non-empty".to_string(),
            ));
        }

        Ok(Self {
            head: head.to_string(),
            relation_type,
            tail: tail.to_string(),
        })
    }

    /// `"head TYPE tail"`, the form handed to the answer generator as context
    pub fn as_fact(&self) -> String {
        format!("{} {} {}", self.head, self.relation_type, self.tail)
    }
}

impl std::fmt::Display for RelationEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.head, self.relation_type, self.tail)
    }
}

/// One unvalidated fact as returned by a fact extractor
///
/// Extractors disagree on key names, so the raw object is kept and resolved
/// through the alias lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactCandidate(pub Map<String, Value>);

impl FactCandidate {
    /// Candidate from a JSON value; `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Convenience constructor using the canonical keys
    pub fn new(head: &str, relation: &str, tail: &str) -> Self {
        let mut map = Map::new();
        map.insert("head".to_string(), Value::String(head.to_string()));
        map.insert("relation".to_string(), Value::String(relation.to_string()));
        map.insert("tail".to_string(), Value::String(tail.to_string()));
        Self(map)
    }

    fn first_present(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.0
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
    }

    pub fn head(&self) -> Option<&str> {
        self.first_present(HEAD_KEYS)
    }

    pub fn relation(&self) -> Option<&str> {
        self.first_present(RELATION_KEYS)
    }

    pub fn tail(&self) -> Option<&str> {
        self.first_present(TAIL_KEYS)
    }

    /// Resolve aliases; `None` if any of the three fields is missing
    pub fn resolve(&self) -> Option<(&str, &str, &str)> {
        Some((self.head()?, self.relation()?, self.tail()?))
    }

    /// Resolve and normalize into an edge
    pub fn to_edge(&self) -> Option<RelationEdge> {
        let (head, relation, tail) = self.resolve()?;
        RelationEdge::new(head, relation, tail).ok()
    }
}
