//! Engine configuration.
//!
//! Values come from a JSON file (see `main.rs`) or from the environment, with
//! defaults matching the production deployment.

use crate::posts::types::SimilarityField;

use serde::{Deserialize, Serialize};

pub const ENV_META_PREFIX: &str = "NEWS_META_PREFIX";
pub const ENV_ADJACENT_DOCS: &str = "NEWS_ADJACENT_DOCS";
pub const ENV_PAGE_SIZE: &str = "NEWS_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Type prefix marking synthesized meta posts.
    pub meta_prefix: String,
    /// Neighbours embedded on each side by single-post lookups.
    pub adjacent_docs: usize,
    /// Per-collection cap applied by the HTTP layer when none is given.
    pub page_size: usize,
    /// Similarity fields expanded when a request does not name any.
    pub similar_fields: Vec<SimilarityField>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            meta_prefix: "metapost".to_string(),
            adjacent_docs: 1,
            page_size: 10,
            similar_fields: SimilarityField::ALL.to_vec(),
        }
    }
}

impl EngineConfig {
    /// Builds a config from `NEWS_*` environment variables, keeping defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(prefix) = lookup(ENV_META_PREFIX).filter(|p| !p.is_empty()) {
            config.meta_prefix = prefix;
        }
        if let Some(count) = parse_usize(&lookup, ENV_ADJACENT_DOCS) {
            config.adjacent_docs = count;
        }
        if let Some(size) = parse_usize(&lookup, ENV_PAGE_SIZE) {
            config.page_size = size;
        }

        config
    }
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<usize> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
