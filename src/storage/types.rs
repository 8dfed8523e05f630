//! Storage Data Types
//!
//! Raw documents and the query shapes passed to a `DocumentStore`. Filters and
//! pipeline stages use the document database's JSON operator vocabulary
//! (`$in`, `$lt`, `$regex`, `$group`, ...), so a networked adapter can forward
//! them untouched.

use serde_json::{Map, Value};

/// A raw document as held by the store.
pub type Document = Map<String, Value>;

/// Internal identifier key of every stored document.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A filtered find against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    /// Filter document; an empty object matches everything.
    pub filter: Value,
    /// Top-level fields to keep (`_id` is always kept). `None` keeps all.
    pub projection: Option<Vec<String>>,
    /// Sort keys, applied in order.
    pub sort: Vec<(String, SortOrder)>,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn new(filter: Value) -> Self {
        Self {
            filter,
            projection: None,
            sort: Vec::new(),
            limit: None,
        }
    }

    pub fn all() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }
}

impl Default for FindQuery {
    fn default() -> Self {
        Self::all()
    }
}
