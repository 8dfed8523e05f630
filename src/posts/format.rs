use super::types::{ID, IS_META, Post, TYPE};
use crate::error::{EngineError, Result};
use crate::storage::types::{Document, ID_FIELD};

use serde_json::Value;

/// Turns raw documents into their external shape.
#[derive(Debug, Clone)]
pub struct Formatter {
    meta_prefix: String,
}

impl Formatter {
    pub fn new(meta_prefix: impl Into<String>) -> Self {
        Self {
            meta_prefix: meta_prefix.into(),
        }
    }

    pub fn meta_prefix(&self) -> &str {
        &self.meta_prefix
    }

    /// Formats `doc`:
    ///
    /// 1. `_id` is removed and its string form stored first under `id`;
    /// 2. `is_meta` is set when `type` starts with the meta prefix;
    /// 3. `update` is merged over the result, key by key;
    /// 4. every key in `exclude` is dropped.
    ///
    /// Fails with [`EngineError::AlreadyFormatted`] when `_id` is absent.
    pub fn format(&self, doc: Document, update: Option<&Document>, exclude: &[&str]) -> Result<Post> {
        let mut id = None;
        let mut content = Vec::with_capacity(doc.len());
        for (key, value) in doc {
            if key == ID_FIELD {
                id = Some(value);
            } else if key != ID {
                content.push((key, value));
            }
        }
        let id = id.ok_or(EngineError::AlreadyFormatted)?;

        let mut out = Document::new();
        out.insert(ID.to_string(), Value::String(id_string(id)));
        out.extend(content);

        let is_meta = out
            .get(TYPE)
            .and_then(Value::as_str)
            .is_some_and(|t| t.starts_with(&self.meta_prefix));
        out.insert(IS_META.to_string(), Value::Bool(is_meta));

        if let Some(update) = update {
            for (key, value) in update {
                out.insert(key.clone(), value.clone());
            }
        }

        out.retain(|key, _| !exclude.contains(&key.as_str()));
        Ok(Post::from_document(out))
    }
}

fn id_string(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
