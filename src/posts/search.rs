use super::expand::ExpandOptions;
use super::filter::PostFilter;
use super::types::{ExpandedPost, RawPost, SimilarityField, TAGS, TYPE};
use crate::days::{CollectionRef, DaySelection};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::storage::object_id::ObjectId;
use crate::storage::types::{FindQuery, ID_FIELD};

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::{Value, json};
use std::collections::HashSet;

/// Lazy, single-pass sequence of expanded posts.
pub type PostStream<'a> = BoxStream<'a, Result<ExpandedPost>>;

/// A cross-collection search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub days: DaySelection,
    /// Cap on matches read from *each* collection.
    pub limit: Option<usize>,
    pub filter: PostFilter,
    /// Top-level fields to read; `None` reads everything. `type` and the
    /// expanded similarity fields are always read.
    pub fields: Option<Vec<String>>,
    pub exclude: Vec<String>,
    /// Neighbours embedded on each side; `0` for none.
    pub adjacent: usize,
    pub similar: Vec<SimilarityField>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            days: DaySelection::All,
            limit: None,
            filter: PostFilter::default(),
            fields: None,
            exclude: Vec::new(),
            adjacent: 0,
            similar: SimilarityField::ALL.to_vec(),
        }
    }
}

impl SearchQuery {
    fn find_query(&self, predicate: Value) -> FindQuery {
        let mut query = FindQuery::new(predicate);
        if let Some(fields) = &self.fields {
            let mut fields = fields.clone();
            fields.push(TYPE.to_string());
            fields.extend(self.similar.iter().map(|f| f.field_name().to_string()));
            query = query.project(fields);
        }
        // a zero cap means no cap, as with the database's own limit
        if let Some(limit) = self.limit.filter(|n| *n > 0) {
            query = query.limit(limit);
        }
        query
    }

    fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            similar: self.similar.clone(),
            adjacent: self.adjacent,
            exclude: self.exclude.clone(),
            depth: 1,
        }
    }
}

impl Engine {
    /// Posts matching `query`, in collection date order then store order.
    ///
    /// Nothing is read until the stream is polled, and each collection is
    /// queried only once the previous one is exhausted. A filter that cannot
    /// match yields an empty stream without touching the store.
    pub fn search(&self, query: SearchQuery) -> PostStream<'_> {
        let Some(predicate) = query.filter.to_predicate() else {
            tracing::info!("Search filter has an empty inclusion set, nothing to read");
            return stream::empty().boxed();
        };
        let find = query.find_query(predicate);
        let options = query.expand_options();
        let days = query.days;

        stream::once(async move { self.resolver().resolve(&days).await })
            .map_ok(|collections| stream::iter(collections.into_iter().map(Ok::<_, EngineError>)))
            .try_flatten()
            .and_then(move |collection| {
                let find = find.clone();
                async move { self.find_raw(collection, &find).await }
            })
            .map_ok(|posts| stream::iter(posts.into_iter().map(Ok::<_, EngineError>)))
            .try_flatten()
            .and_then(move |raw| {
                let options = options.clone();
                async move { self.expander().expand(raw, &options).await }
            })
            .boxed()
    }

    async fn find_raw(&self, collection: CollectionRef, query: &FindQuery) -> Result<Vec<RawPost>> {
        let docs = self.store().find(&collection.name(), query).await?;
        tracing::debug!("{} posts matched in {}", docs.len(), collection);

        Ok(docs
            .into_iter()
            .filter_map(|doc| match RawPost::new(collection, doc) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!("Skipping unreadable post in {}: {}", collection, e);
                    None
                }
            })
            .collect())
    }

    /// Looks a post up across every collection, with its configured similar
    /// posts and `adjacent` neighbours on each side (the configured default
    /// when `None`). Empty or malformed identifiers find nothing.
    pub async fn find_post(&self, post_id: &str, adjacent: Option<usize>) -> Result<Option<ExpandedPost>> {
        let id = match post_id.trim().parse::<ObjectId>() {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!("find_post: {}", e);
                return Ok(None);
            }
        };

        let query = SearchQuery {
            limit: Some(1),
            filter: PostFilter {
                post_ids: Some(vec![id.to_hex()]),
                ..PostFilter::default()
            },
            adjacent: adjacent.unwrap_or(self.config().adjacent_docs),
            similar: self.config().similar_fields.clone(),
            ..SearchQuery::default()
        };
        let mut posts = self.search(query);
        posts.try_next().await
    }

    /// Distinct tags across the selected collections, in first-seen order.
    pub async fn distinct_tags(&self, days: &DaySelection) -> Result<Vec<String>> {
        let tags_path = format!("${}", TAGS);
        let pipeline = [
            json!({"$unwind": tags_path}),
            json!({"$group": {ID_FIELD: tags_path}}),
        ];

        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for collection in self.resolver().resolve(days).await? {
            let rows = self.store().aggregate(&collection.name(), &pipeline).await?;
            for row in rows {
                if let Some(Value::String(tag)) = row.get(ID_FIELD)
                    && seen.insert(tag.clone())
                {
                    tags.push(tag.clone());
                }
            }
        }

        tracing::info!("Found {} distinct tags", tags.len());
        Ok(tags)
    }
}
