//! Shared fixtures for the unit tests: identifiers, post builders and store
//! wrappers that count or fail calls.

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::StoreError;
use crate::storage::memory::MemoryStore;
use crate::storage::store::DocumentStore;
use crate::storage::types::{Document, FindQuery};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic identifier: `n` as 24 hex digits, so ordering follows `n`.
pub fn oid(n: u64) -> String {
    format!("{:024x}", n)
}

pub fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

/// A plain post with an id, a type and a title.
pub fn post(n: u64, post_type: &str) -> Document {
    doc(json!({"_id": oid(n), "type": post_type, "title": format!("post {}", n)}))
}

/// A post carrying extra fields merged over [`post`].
pub fn post_with(n: u64, post_type: &str, extra: Value) -> Document {
    let mut base = post(n, post_type);
    if let Value::Object(extra) = extra {
        base.extend(extra);
    }
    base
}

pub fn store_with(collections: Vec<(&str, Vec<Document>)>) -> MemoryStore {
    let store = MemoryStore::new();
    for (name, docs) in collections {
        store.insert_many(name, docs).unwrap();
    }
    store
}

pub fn engine(store: impl DocumentStore + 'static) -> Engine {
    Engine::new(Arc::new(store), EngineConfig::default())
}

/// Wraps a store and counts every call made through it.
pub struct CountingStore {
    inner: MemoryStore,
    lists: AtomicUsize,
    finds: AtomicUsize,
    aggregates: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            lists: AtomicUsize::new(0),
            finds: AtomicUsize::new(0),
            aggregates: AtomicUsize::new(0),
        })
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn aggregates(&self) -> usize {
        self.aggregates.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.lists() + self.finds() + self.aggregates()
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list_collections().await
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, query).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
    ) -> Result<Vec<Document>, StoreError> {
        self.aggregates.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(collection, pipeline).await
    }
}

/// Lists day collections but fails every query.
pub struct UnavailableStore {
    pub collections: Vec<String>,
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.clone())
    }

    async fn find(&self, _: &str, _: &FindQuery) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn aggregate(&self, _: &str, _: &[Value]) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}
