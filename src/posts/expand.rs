use super::format::Formatter;
use super::types::{
    ExpandedPost, NEXT, PREVIOUS, Post, REFERENCE_FIELDS, RawPost, SCORE, SimilarRef,
    SimilarityField, TYPE,
};
use crate::days::CollectionRef;
use crate::error::Result;
use crate::storage::object_id::ObjectId;
use crate::storage::store::DocumentStore;
use crate::storage::types::{Document, FindQuery, ID_FIELD, SortOrder};

use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// What to resolve on each post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Similarity fields to expand, in output order.
    pub similar: Vec<SimilarityField>,
    /// Neighbours on each side; `0` leaves `previous`/`next` unset.
    pub adjacent: usize,
    /// Keys dropped from the top-level post. Naming an expansion field here
    /// also skips that expansion.
    pub exclude: Vec<String>,
    /// Expansion levels. `0` returns the bare post; anything above embeds
    /// sub-posts once, and sub-posts are never expanded themselves.
    pub depth: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            similar: SimilarityField::ALL.to_vec(),
            adjacent: 0,
            exclude: Vec::new(),
            depth: 1,
        }
    }
}

impl ExpandOptions {
    fn excludes(&self, field: &str) -> bool {
        self.exclude.iter().any(|e| e == field)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Previous,
    Next,
}

/// Resolves a post's similarity references and neighbours inside its own
/// day collection.
pub struct Expander<'a> {
    store: &'a dyn DocumentStore,
    formatter: &'a Formatter,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a dyn DocumentStore, formatter: &'a Formatter) -> Self {
        Self { store, formatter }
    }

    pub async fn expand(&self, raw: RawPost, options: &ExpandOptions) -> Result<ExpandedPost> {
        let collection = raw.collection();
        let mut siblings = None;
        let mut related = None;
        let mut previous = None;
        let mut next = None;

        if options.depth > 0 {
            for field in &options.similar {
                if options.excludes(field.field_name()) {
                    continue;
                }
                let refs = raw.similar_refs(*field);
                let posts = self.resolve_refs(collection, &refs).await?;
                match field {
                    SimilarityField::Siblings => siblings = Some(posts),
                    SimilarityField::Related => related = Some(posts),
                }
            }

            if options.adjacent > 0 {
                let post_type = raw.post_type();
                if !options.excludes(PREVIOUS) {
                    previous = Some(
                        self.neighbours(collection, raw.id(), post_type, options.adjacent, Direction::Previous)
                            .await?,
                    );
                }
                if !options.excludes(NEXT) {
                    next = Some(
                        self.neighbours(collection, raw.id(), post_type, options.adjacent, Direction::Next)
                            .await?,
                    );
                }
            }
        }

        let mut exclude: Vec<&str> = options.exclude.iter().map(String::as_str).collect();
        exclude.extend(REFERENCE_FIELDS);
        let post = self.formatter.format(raw.into_document(), None, &exclude)?;

        Ok(ExpandedPost {
            post,
            siblings,
            related,
            previous,
            next,
        })
    }

    /// Fetches the referenced posts with one `$in` query and returns them in
    /// reference order, each carrying its similarity score. References to
    /// posts missing from the collection are dropped.
    async fn resolve_refs(&self, collection: CollectionRef, refs: &[SimilarRef]) -> Result<Vec<Post>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = refs.iter().map(|r| r.id.to_hex()).collect();
        let query = FindQuery::new(json!({ID_FIELD: {"$in": ids}}));
        let found = self.store.find(&collection.name(), &query).await?;

        let by_id: HashMap<String, Document> = found
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get(ID_FIELD)?.as_str()?.to_string();
                Some((id, doc))
            })
            .collect();

        let mut posts = Vec::with_capacity(refs.len());
        for reference in refs {
            let Some(doc) = by_id.get(&reference.id.to_hex()) else {
                tracing::debug!("Dangling reference {} in {}", reference.id, collection);
                continue;
            };
            let mut update = Map::new();
            update.insert(SCORE.to_string(), Value::Number(reference.score.clone()));
            posts.push(self.leaf(doc.clone(), Some(&update))?);
        }
        Ok(posts)
    }

    async fn neighbours(
        &self,
        collection: CollectionRef,
        current: ObjectId,
        post_type: Option<&str>,
        limit: usize,
        direction: Direction,
    ) -> Result<Vec<Post>> {
        let (op, order) = match direction {
            Direction::Previous => ("$lt", SortOrder::Descending),
            Direction::Next => ("$gt", SortOrder::Ascending),
        };

        let mut filter = Map::new();
        filter.insert(ID_FIELD.to_string(), json!({op: current.to_hex()}));
        if let Some(post_type) = post_type {
            filter.insert(
                TYPE.to_string(),
                json!({"$regex": format!("^{}$", regex::escape(post_type)), "$options": "i"}),
            );
        }

        let query = FindQuery::new(Value::Object(filter))
            .sort_by(ID_FIELD, order)
            .limit(limit);
        let docs = self.store.find(&collection.name(), &query).await?;
        tracing::debug!("{:?} neighbours of {}: {}", direction, current, docs.len());

        docs.into_iter().map(|doc| self.leaf(doc, None)).collect()
    }

    /// Formats an embedded post, stripped of its own references.
    fn leaf(&self, doc: Document, update: Option<&Document>) -> Result<Post> {
        self.formatter.format(doc, update, &REFERENCE_FIELDS)
    }
}
