use crate::days::CollectionRef;
use crate::error::{EngineError, Result};
use crate::storage::object_id::ObjectId;
use crate::storage::types::{Document, ID_FIELD};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::str::FromStr;

// Post document fields
pub const ID: &str = "id";
pub const TYPE: &str = "type";
pub const IS_META: &str = "is_meta";
pub const SIBLINGS: &str = "siblings";
pub const RELATED: &str = "related";
pub const PREVIOUS: &str = "previous";
pub const NEXT: &str = "next";
pub const SCORE: &str = "score";
pub const STATS: &str = "stats";
pub const TAGS: &str = "tags";
pub const VIDEOS: &str = "videos";
pub const COUNTRY: &str = "country";
pub const CATEGORY: &str = "category";

/// Fields replaced by expansion. Never copied from the raw document.
pub const REFERENCE_FIELDS: [&str; 4] = [SIBLINGS, RELATED, PREVIOUS, NEXT];

/// User actions recorded under `stats`.
pub const POST_ACTIONS: &[&str] = &["clicks"];

/// Precomputed similarity links held by a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityField {
    Siblings,
    Related,
}

impl SimilarityField {
    pub const ALL: [SimilarityField; 2] = [SimilarityField::Siblings, SimilarityField::Related];

    pub fn field_name(self) -> &'static str {
        match self {
            Self::Siblings => SIBLINGS,
            Self::Related => RELATED,
        }
    }
}

impl FromStr for SimilarityField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            SIBLINGS => Ok(Self::Siblings),
            RELATED => Ok(Self::Related),
            other => Err(format!("unknown similarity field '{}'", other)),
        }
    }
}

/// One `{_id, score}` entry of a similarity field.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarRef {
    pub id: ObjectId,
    pub score: Number,
}

/// A document as returned by the store, still carrying `_id`, together with
/// the day collection it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPost {
    collection: CollectionRef,
    id: ObjectId,
    doc: Document,
}

impl RawPost {
    pub fn new(collection: CollectionRef, doc: Document) -> Result<Self> {
        let id = match doc.get(ID_FIELD) {
            Some(Value::String(hex)) => hex.parse()?,
            Some(other) => return Err(EngineError::InvalidIdentifier(other.to_string())),
            None => return Err(EngineError::AlreadyFormatted),
        };
        Ok(Self { collection, id, doc })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn collection(&self) -> CollectionRef {
        self.collection
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn post_type(&self) -> Option<&str> {
        self.doc.get(TYPE).and_then(Value::as_str)
    }

    /// Entries of a similarity field in stored order. A missing field reads
    /// as empty; malformed entries are skipped.
    pub fn similar_refs(&self, field: SimilarityField) -> Vec<SimilarRef> {
        let Some(entries) = self.doc.get(field.field_name()).and_then(Value::as_array) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let parsed = entry
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .and_then(|hex| hex.parse::<ObjectId>().ok());
                let Some(id) = parsed else {
                    tracing::warn!(
                        "Skipping malformed {} entry on {}: {}",
                        field.field_name(),
                        self.id,
                        entry
                    );
                    return None;
                };
                let score = match entry.get(SCORE) {
                    Some(Value::Number(n)) => n.clone(),
                    _ => Number::from(0),
                };
                Some(SimilarRef { id, score })
            })
            .collect()
    }

    pub fn into_document(self) -> Document {
        self.doc
    }
}

/// A formatted post: `id` instead of `_id`, `is_meta` derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Post(Document);

impl Post {
    pub(crate) fn from_document(doc: Document) -> Self {
        Self(doc)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_meta(&self) -> bool {
        self.0.get(IS_META).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

/// A formatted post with its references resolved.
///
/// Sub-posts are plain [`Post`]s, so expansion never goes more than one
/// level deep. `None` means the expansion was not requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siblings: Option<Vec<Post>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<Post>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Vec<Post>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Vec<Post>>,
}

impl ExpandedPost {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            siblings: None,
            related: None,
            previous: None,
            next: None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.post.id()
    }

    pub fn similar(&self, field: SimilarityField) -> Option<&[Post]> {
        match field {
            SimilarityField::Siblings => self.siblings.as_deref(),
            SimilarityField::Related => self.related.as_deref(),
        }
    }
}
