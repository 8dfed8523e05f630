//! Document Store Adapter
//!
//! The seam between the engine and the database. Implementations are pure
//! pass-through: no business logic, no retries, no caching.

use super::types::{Document, FindQuery};
use crate::error::StoreError;

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of every collection in the database, day buckets or not.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Runs a filtered find. A missing collection yields no documents.
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    /// Runs an aggregation pipeline and returns its output rows.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
    ) -> Result<Vec<Document>, StoreError>;
}
