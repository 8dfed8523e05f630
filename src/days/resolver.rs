use crate::error::{EngineError, Result};
use crate::storage::store::DocumentStore;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name format of day collections.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` day parameter.
pub fn parse_day(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DAY_FORMAT)
        .ok()
        // chrono accepts unpadded months and days; collection names never are
        .filter(|date| date.format(DAY_FORMAT).to_string() == trimmed)
        .ok_or_else(|| EngineError::InvalidDate(raw.to_string()))
}

/// A day collection known to exist in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionRef(NaiveDate);

impl CollectionRef {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Interprets a collection name as a day; `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        parse_day(name).ok().map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn name(&self) -> String {
        self.0.format(DAY_FORMAT).to_string()
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

/// Which days a query covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DaySelection {
    #[default]
    All,
    /// Explicit days, in any order, duplicates allowed.
    Days(Vec<NaiveDate>),
    /// Inclusive bounds; a missing bound is open-ended.
    Range {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl DaySelection {
    /// Builds a selection from the three optional query inputs. An explicit
    /// day list wins over a range.
    pub fn new(
        days: Option<Vec<NaiveDate>>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Self> {
        if let Some(days) = days {
            return Ok(Self::Days(days));
        }
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(EngineError::InvalidRange { from, to });
        }
        if from.is_none() && to.is_none() {
            return Ok(Self::All);
        }
        Ok(Self::Range { from, to })
    }

    /// Same as [`DaySelection::new`] but from raw `YYYY-MM-DD` strings.
    pub fn parse(days: Option<&[String]>, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let days = days
            .map(|days| days.iter().map(|d| parse_day(d)).collect::<Result<Vec<_>>>())
            .transpose()?;
        let from = from.map(parse_day).transpose()?;
        let to = to.map(parse_day).transpose()?;
        Self::new(days, from, to)
    }

    pub fn days(days: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self::Days(days.into_iter().collect())
    }

    pub fn admits(&self, date: NaiveDate) -> bool {
        match self {
            Self::All => true,
            Self::Days(days) => days.contains(&date),
            Self::Range { from, to } => {
                from.is_none_or(|from| date >= from) && to.is_none_or(|to| date <= to)
            }
        }
    }
}

/// Maps a [`DaySelection`] to the day collections present in the store.
pub struct CollectionResolver<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CollectionResolver<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Ascending, duplicate-free collections admitted by `selection`. Names in
    /// the store that are not days are ignored.
    pub async fn resolve(&self, selection: &DaySelection) -> Result<Vec<CollectionRef>> {
        let names = self.store.list_collections().await?;

        let mut refs: Vec<CollectionRef> = names
            .iter()
            .filter_map(|name| CollectionRef::parse(name))
            .filter(|day| selection.admits(day.date()))
            .collect();
        refs.sort();
        refs.dedup();

        tracing::debug!(
            "Resolved {:?} to {} collections out of {}",
            selection,
            refs.len(),
            names.len()
        );
        Ok(refs)
    }
}
