use crate::days::DaySelection;
use crate::error::{EngineError, Result};
use crate::posts::filter::PostFilter;
use crate::posts::types::{CATEGORY, COUNTRY, ExpandedPost, RELATED, SCORE, SIBLINGS, TAGS};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Field posts are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupBy {
    #[serde(rename = "countries")]
    Country,
    #[serde(rename = "categories")]
    Category,
    #[serde(rename = "tags")]
    Tag,
    /// Posts referenced under `siblings`.
    #[serde(rename = "siblings")]
    SiblingRef,
    /// Posts referenced under `related`.
    #[serde(rename = "related")]
    RelatedRef,
}

impl GroupBy {
    /// Path of the group key in a post.
    pub fn field_path(self) -> &'static str {
        match self {
            Self::Country => COUNTRY,
            Self::Category => CATEGORY,
            Self::Tag => TAGS,
            Self::SiblingRef => "siblings._id",
            Self::RelatedRef => "related._id",
        }
    }

    /// Array field to unwind before grouping, if any.
    pub fn unwind_path(self) -> Option<&'static str> {
        match self {
            Self::Country | Self::Category => None,
            Self::Tag => Some(TAGS),
            Self::SiblingRef => Some(SIBLINGS),
            Self::RelatedRef => Some(RELATED),
        }
    }

    /// Whether group keys are identifiers of posts in the same collection.
    pub fn is_self_relation(self) -> bool {
        matches!(self, Self::SiblingRef | Self::RelatedRef)
    }

    /// Key name used in result rows.
    pub fn label(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Category => "category",
            Self::Tag => "tag",
            Self::SiblingRef => "sibling",
            Self::RelatedRef => "related",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Country => "countries",
            Self::Category => "categories",
            Self::Tag => "tags",
            Self::SiblingRef => "siblings",
            Self::RelatedRef => "related",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What is summed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SumBy {
    /// One per grouped row.
    #[default]
    Count,
    /// Similarity score of the `siblings` entry.
    #[serde(rename = "siblings")]
    SiblingScore,
    /// Similarity score of the `related` entry.
    #[serde(rename = "related")]
    RelatedScore,
}

impl SumBy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::SiblingScore => "siblings",
            Self::RelatedScore => "related",
        }
    }

    /// The `$sum` operand for grouping by `group_by`. Scores only exist on
    /// the relation being unwound.
    pub fn accumulator(self, group_by: GroupBy) -> Result<serde_json::Value> {
        match (self, group_by) {
            (Self::Count, _) => Ok(serde_json::Value::from(1)),
            (Self::SiblingScore, GroupBy::SiblingRef) => Ok(format!("${}.{}", SIBLINGS, SCORE).into()),
            (Self::RelatedScore, GroupBy::RelatedRef) => Ok(format!("${}.{}", RELATED, SCORE).into()),
            _ => Err(EngineError::InvalidAggregation {
                group_by: group_by.name(),
                sum_by: self.name(),
            }),
        }
    }
}

/// A group-by/sum over a day selection.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub days: DaySelection,
    pub group_by: GroupBy,
    pub sum_by: SumBy,
    pub filter: PostFilter,
    /// Keep only the top groups after the global sort.
    pub limit: Option<usize>,
    /// Attach the referenced post to each group of a self-relation.
    pub include_docs: bool,
}

impl AggregateQuery {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            days: DaySelection::All,
            group_by,
            sum_by: SumBy::Count,
            filter: PostFilter::default(),
            limit: None,
            include_docs: true,
        }
    }
}

/// One ranked group. Serialized as `{<label>: key, value, doc?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub group_by: GroupBy,
    pub key: String,
    pub value: f64,
    pub doc: Option<ExpandedPost>,
}

impl Serialize for GroupCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.doc.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(self.group_by.label(), &self.key)?;
        if self.value.fract() == 0.0 && self.value.abs() < i64::MAX as f64 {
            map.serialize_entry("value", &(self.value as i64))?;
        } else {
            map.serialize_entry("value", &self.value)?;
        }
        if let Some(doc) = &self.doc {
            map.serialize_entry("doc", doc)?;
        }
        map.end()
    }
}
