//! Document Storage Module
//!
//! The boundary between the engine and the document database.
//!
//! ## Core Concepts
//! - **Adapter**: `DocumentStore` is the only way the engine touches data. It
//!   lists collections, runs filtered finds and runs aggregation pipelines.
//! - **Documents**: Raw JSON objects keyed by an internal `_id` (`ObjectId`).
//! - **Query language**: Filters and pipelines are plain JSON using the
//!   database's `$`-operator vocabulary, so they pass through adapters untouched.
//! - **In-memory backend**: `MemoryStore` evaluates that vocabulary in process;
//!   it backs the binary and the test suite.

pub mod memory;
pub mod object_id;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod types;
