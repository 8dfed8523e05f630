use super::types::{CATEGORY, COUNTRY, TYPE, VIDEOS};
use crate::storage::object_id::ObjectId;
use crate::storage::types::ID_FIELD;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Post selection criteria, AND-ed together. Unset criteria match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFilter {
    /// Exact type, compared case-insensitively.
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    /// Whether the post must (or must not) have a `videos` field.
    pub has_videos: Option<bool>,
    pub countries: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    /// Post identifiers as hex strings; malformed ones are ignored.
    pub post_ids: Option<Vec<String>>,
}

impl PostFilter {
    /// Store predicate for this filter, or `None` when nothing can match: an
    /// inclusion set was given but is empty.
    pub fn to_predicate(&self) -> Option<Value> {
        let mut clauses = Vec::new();

        if let Some(post_type) = &self.post_type {
            clauses.push(json!({
                TYPE: {"$regex": format!("^{}$", regex::escape(post_type)), "$options": "i"}
            }));
        }

        if let Some(has_videos) = self.has_videos {
            clauses.push(json!({VIDEOS: {"$exists": has_videos}}));
        }

        for (field, values) in [(COUNTRY, &self.countries), (CATEGORY, &self.categories)] {
            if let Some(values) = values {
                if values.is_empty() {
                    return None;
                }
                clauses.push(json!({field: {"$in": values}}));
            }
        }

        if let Some(post_ids) = &self.post_ids {
            let ids: Vec<String> = post_ids
                .iter()
                .filter_map(|raw| match raw.parse::<ObjectId>() {
                    Ok(id) => Some(id.to_hex()),
                    Err(e) => {
                        tracing::warn!("Dropping post id from filter: {}", e);
                        None
                    }
                })
                .collect();
            if ids.is_empty() {
                return None;
            }
            clauses.push(json!({ID_FIELD: {"$in": ids}}));
        }

        Some(match clauses.len() {
            0 => json!({}),
            1 => clauses.remove(0),
            _ => json!({"$and": clauses}),
        })
    }
}
