//! Daily Posts Engine Library
//!
//! Search, expansion and aggregation over news posts stored as one
//! collection per calendar day (`YYYY-MM-DD`). The binary (`main.rs`) wires
//! these modules behind an HTTP router.
//!
//! ## Architecture Modules
//! - **`storage`**: The document store seam (`DocumentStore`) plus an
//!   in-memory implementation with a small find/aggregate query language.
//! - **`days`**: Day parsing, day selections and their resolution against the
//!   collections the store actually holds.
//! - **`posts`**: Formatting, filtering, expansion (similarity and adjacency)
//!   and the lazy cross-collection search built on top of them.
//! - **`aggregate`**: Group-by/sum pipelines run per collection and ranked
//!   globally.
//! - **`engine`**: The shared handle owning the store and configuration.

pub mod aggregate;
pub mod config;
pub mod days;
pub mod engine;
pub mod error;
pub mod posts;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;
