use super::object_id::ObjectId;
use super::pipeline::run_pipeline;
use super::query::{matches, project, sort_documents};
use super::store::DocumentStore;
use super::types::{Document, FindQuery, ID_FIELD};
use crate::error::{EngineError, StoreError};

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::path::Path;

/// In-process `DocumentStore`: one vector of documents per collection.
///
/// Identifiers are held in their lowercase hex form so that string ordering
/// matches identifier ordering.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends documents to `collection`, creating it if needed. Documents
    /// without `_id` get a fresh one. Returns the number inserted.
    pub fn insert_many(
        &self,
        collection: &str,
        docs: impl IntoIterator<Item = Document>,
    ) -> Result<usize, EngineError> {
        let mut prepared = Vec::new();
        for mut doc in docs {
            normalize_ids(&mut doc)?;
            if !doc.contains_key(ID_FIELD) {
                let mut with_id = Document::new();
                with_id.insert(ID_FIELD.to_string(), Value::String(ObjectId::new().to_hex()));
                with_id.extend(doc);
                doc = with_id;
            }
            prepared.push(doc);
        }

        let inserted = prepared.len();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(prepared);
        tracing::debug!("Inserted {} documents into {}", inserted, collection);
        Ok(inserted)
    }

    /// Loads every `*.json` file of `dir` as a collection named after the
    /// file stem. Each file holds a JSON array of documents.
    pub fn load_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let store = Self::new();

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading data directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let docs: Vec<Document> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            let count = store.insert_many(name, docs)?;
            tracing::info!("Loaded {} documents into collection {}", count, name);
        }

        Ok(store)
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn document_count(&self) -> usize {
        self.collections.iter().map(|entry| entry.value().len()).sum()
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

/// Rewrites `{"$oid": "..."}` wrappers (as produced by database exports) to
/// plain hex strings and canonicalizes every `_id` to lowercase hex.
fn normalize_ids(doc: &mut Document) -> Result<(), EngineError> {
    for (key, value) in doc.iter_mut() {
        let unwrapped = value
            .as_object()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.get("$oid"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(hex) = unwrapped {
            *value = Value::String(hex);
        }

        if key == ID_FIELD {
            if let Value::String(hex) = value {
                *hex = hex.parse::<ObjectId>()?.to_hex();
            }
            continue;
        }

        match value {
            Value::Object(inner) => normalize_ids(inner)?,
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        normalize_ids(inner)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let mut found = Vec::new();
        for doc in self.snapshot(collection) {
            if matches(&doc, &query.filter)? {
                found.push(doc);
            }
        }

        sort_documents(&mut found, &query.sort);
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        if let Some(fields) = &query.projection {
            found = found.into_iter().map(|doc| project(doc, fields)).collect();
        }

        tracing::debug!("find on {} returned {} documents", collection, found.len());
        Ok(found)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.snapshot(collection);
        let source = |name: &str| self.snapshot(name);
        run_pipeline(docs, pipeline, &source)
    }
}
