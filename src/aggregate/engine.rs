use super::pipeline::{DOC_FIELD, VALUE_FIELD, build_pipeline};
use super::types::{AggregateQuery, GroupBy, GroupCount, SumBy};
use crate::days::{CollectionRef, DaySelection};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::posts::expand::ExpandOptions;
use crate::posts::types::RawPost;
use crate::storage::types::{Document, ID_FIELD};

use futures::future::try_join_all;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct GroupEntry {
    sum: f64,
    representative: Option<(CollectionRef, Document)>,
}

/// A group after the cross-collection merge.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGroup {
    pub key: String,
    pub sum: f64,
    pub representative: Option<(CollectionRef, Document)>,
}

/// Running sums per group key across collections.
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    entries: HashMap<String, GroupEntry>,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to `key`. The first representative offered for a key is
    /// the one kept.
    pub fn add(&mut self, key: String, value: f64, representative: Option<(CollectionRef, Document)>) {
        let entry = self.entries.entry(key).or_default();
        entry.sum += value;
        if entry.representative.is_none() {
            entry.representative = representative;
        }
    }

    /// Folds the rows of one collection's pipeline. Rows with a falsy key
    /// (missing, null, empty, `false`, `0`) are dropped.
    pub fn merge_rows(&mut self, collection: CollectionRef, rows: Vec<Document>) {
        for row in rows {
            let Some(key) = group_key(row.get(ID_FIELD)) else {
                tracing::debug!("Dropping group with empty key in {}", collection);
                continue;
            };
            let value = row.get(VALUE_FIELD).and_then(Value::as_f64).unwrap_or(0.0);
            let representative = row
                .get(DOC_FIELD)
                .and_then(Value::as_array)
                .and_then(|docs| docs.first())
                .and_then(Value::as_object)
                .map(|doc| (collection, doc.clone()));
            self.add(key, value, representative);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups by descending sum, ties broken by ascending key.
    pub fn into_ranked(self) -> Vec<RankedGroup> {
        let mut ranked: Vec<RankedGroup> = self
            .entries
            .into_iter()
            .map(|(key, entry)| RankedGroup {
                key,
                sum: entry.sum,
                representative: entry.representative,
            })
            .collect();
        ranked.sort_by(|a, b| b.sum.total_cmp(&a.sum).then_with(|| a.key.cmp(&b.key)));
        ranked
    }
}

fn group_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

impl Engine {
    /// Groups the posts of the selected collections and ranks the groups
    /// globally by their summed value.
    ///
    /// One pipeline runs per collection, concurrently; results are merged in
    /// collection order. For self-relations the first-seen referenced post of
    /// each surviving group is attached, expanded.
    pub async fn aggregate_group(&self, query: &AggregateQuery) -> Result<Vec<GroupCount>> {
        query.sum_by.accumulator(query.group_by)?;

        let Some(predicate) = query.filter.to_predicate() else {
            tracing::info!("Aggregation filter has an empty inclusion set, nothing to read");
            return Ok(Vec::new());
        };

        let collections = self.resolver().resolve(&query.days).await?;
        let pipelines = collections
            .iter()
            .map(|collection| {
                build_pipeline(
                    *collection,
                    predicate.clone(),
                    query.group_by,
                    query.sum_by,
                    query.include_docs,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let runs = collections.iter().zip(&pipelines).map(|(collection, pipeline)| async move {
            let rows = self.store().aggregate(&collection.name(), pipeline).await?;
            tracing::debug!("{} groups by {} in {}", rows.len(), query.group_by, collection);
            Ok::<_, EngineError>((*collection, rows))
        });
        let results = try_join_all(runs).await?;

        let mut accumulator = GroupAccumulator::new();
        for (collection, rows) in results {
            accumulator.merge_rows(collection, rows);
        }

        let mut ranked = accumulator.into_ranked();
        if let Some(limit) = query.limit {
            ranked.truncate(limit);
        }

        let expander = self.expander();
        let options = ExpandOptions {
            similar: self.config().similar_fields.clone(),
            ..ExpandOptions::default()
        };
        let mut groups = Vec::with_capacity(ranked.len());
        for group in ranked {
            let doc = match group.representative {
                Some((collection, doc)) if query.include_docs => {
                    match RawPost::new(collection, doc) {
                        Ok(raw) => Some(expander.expand(raw, &options).await?),
                        Err(e) => {
                            tracing::warn!(
                                "Skipping unreadable representative of {} in {}: {}",
                                group.key,
                                collection,
                                e
                            );
                            None
                        }
                    }
                }
                _ => None,
            };
            groups.push(GroupCount {
                group_by: query.group_by,
                key: group.key,
                value: group.sum,
                doc,
            });
        }

        tracing::info!(
            "Aggregated {} groups by {} over {} collections",
            groups.len(),
            query.group_by,
            collections.len()
        );
        Ok(groups)
    }

    /// Post counts per tag, most used first.
    pub async fn tag_counts(&self, days: DaySelection) -> Result<Vec<GroupCount>> {
        let query = AggregateQuery {
            days,
            sum_by: SumBy::Count,
            ..AggregateQuery::new(GroupBy::Tag)
        };
        self.aggregate_group(&query).await
    }
}
