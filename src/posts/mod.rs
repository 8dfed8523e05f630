//! Posts Module
//!
//! Reading news posts out of the day collections.
//!
//! ## Responsibilities
//! - **Formatting**: Raw documents become external posts (`id` instead of
//!   `_id`, derived `is_meta`).
//! - **Expansion**: `siblings`/`related` references are replaced by the posts
//!   they point to, and `previous`/`next` neighbours of the same type are
//!   embedded. Embedded posts are never expanded themselves.
//! - **Search**: A lazy stream of expanded posts across a day selection, plus
//!   single-post lookup and distinct tags.
//! - **Stats**: Recorded user actions compiled over matched posts.
//!
//! ## Submodules
//! - **`types`**: Raw, formatted and expanded post shapes.
//! - **`format`**: The document formatter.
//! - **`filter`**: `PostFilter` and its store predicate.
//! - **`expand`**: The expansion engine.
//! - **`search`**: Cross-collection search on `Engine`.
//! - **`stats`**: Action statistics.
//! - **`handlers`**: HTTP handlers for the Axum server.

pub mod expand;
pub mod filter;
pub mod format;
pub mod handlers;
pub mod search;
pub mod stats;
pub mod types;
