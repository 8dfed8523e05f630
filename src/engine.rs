//! The query engine.
//!
//! `Engine` owns the store handle and the configuration. Its operations are
//! split by concern: search and single-post lookup live in `posts`,
//! grouping in `aggregate`.

use crate::config::EngineConfig;
use crate::days::CollectionResolver;
use crate::posts::expand::Expander;
use crate::posts::format::Formatter;
use crate::storage::store::DocumentStore;

use std::sync::Arc;

pub struct Engine {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    formatter: Formatter,
}

impl Engine {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        let formatter = Formatter::new(config.meta_prefix.clone());
        Self {
            store,
            config,
            formatter,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn resolver(&self) -> CollectionResolver<'_> {
        CollectionResolver::new(self.store())
    }

    pub fn expander(&self) -> Expander<'_> {
        Expander::new(self.store(), &self.formatter)
    }
}
