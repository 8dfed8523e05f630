//! Aggregation Module
//!
//! Group-by/sum over posts, ranked across every selected day collection.
//!
//! ## Core Concepts
//! - **`GroupBy`**: Closed set of groupable fields. Each variant knows its
//!   field path, whether it must be unwound and whether its keys are post
//!   identifiers (a self-relation).
//! - **Per-collection pipelines**: `$match` → `$unwind` → `$group` → `$lookup`
//!   → `$sort`, one per collection, run concurrently.
//! - **Global ranking**: `GroupAccumulator` sums recurring keys across
//!   collections and ranks once at the end, so the order reflects all days
//!   and not just the last one scanned.

pub mod engine;
pub mod handlers;
pub mod pipeline;
pub mod types;

#[cfg(test)]
mod tests;
