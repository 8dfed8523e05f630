//! Day Collections Module
//!
//! Posts are bucketed into one collection per calendar day, named
//! `YYYY-MM-DD`. This module maps a logical day selection onto those
//! physical collections.
//!
//! ## Core Concepts
//! - **`CollectionRef`**: A collection name proven to be a valid day.
//! - **`DaySelection`**: All days, an explicit list, or an inclusive range
//!   (either bound may be open).
//! - **`CollectionResolver`**: Intersects a selection with the collections the
//!   store actually holds, ascending and without duplicates.

pub mod resolver;

pub use resolver::{CollectionRef, CollectionResolver, DaySelection, parse_day};
