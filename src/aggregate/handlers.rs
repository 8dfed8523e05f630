use super::types::{AggregateQuery, GroupBy, GroupCount, SumBy};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::posts::filter::PostFilter;
use crate::posts::handlers::{day_selection, split_list};

use axum::extract::Query;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_include_docs() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub group_by: GroupBy,
    #[serde(default)]
    pub sum_by: SumBy,
    pub days: Option<String>,
    pub days_from: Option<String>,
    pub days_to: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub has_videos: Option<bool>,
    pub countries: Option<String>,
    pub categories: Option<String>,
    pub post_ids: Option<String>,
    pub limit: Option<usize>,
    #[serde(default = "default_include_docs")]
    pub include_docs: bool,
}

impl AggregateParams {
    pub fn to_query(&self) -> Result<AggregateQuery> {
        Ok(AggregateQuery {
            days: day_selection(
                self.days.as_deref(),
                self.days_from.as_deref(),
                self.days_to.as_deref(),
            )?,
            group_by: self.group_by,
            sum_by: self.sum_by,
            filter: PostFilter {
                post_type: self.post_type.clone(),
                has_videos: self.has_videos,
                countries: split_list(self.countries.as_deref()),
                categories: split_list(self.categories.as_deref()),
                post_ids: split_list(self.post_ids.as_deref()),
            },
            limit: self.limit,
            include_docs: self.include_docs,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    pub group_by: GroupBy,
    pub sum_by: SumBy,
    pub groups: Vec<GroupCount>,
}

pub async fn handle_aggregate(
    Query(params): Query<AggregateParams>,
    Extension(engine): Extension<Arc<Engine>>,
) -> std::result::Result<(StatusCode, Json<AggregateResponse>), EngineError> {
    let query = params.to_query()?;
    let groups = engine.aggregate_group(&query).await?;

    Ok((
        StatusCode::OK,
        Json(AggregateResponse {
            group_by: query.group_by,
            sum_by: query.sum_by,
            groups,
        }),
    ))
}
