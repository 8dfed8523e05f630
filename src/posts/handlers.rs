use super::filter::PostFilter;
use super::search::SearchQuery;
use super::stats::PostStats;
use super::types::ExpandedPost;
use crate::config::EngineConfig;
use crate::days::DaySelection;
use crate::engine::Engine;
use crate::error::{EngineError, Result};

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Splits a comma-separated query value. An empty value is an empty list.
pub(crate) fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect()
    })
}

pub(crate) fn day_selection(
    days: Option<&str>,
    days_from: Option<&str>,
    days_to: Option<&str>,
) -> Result<DaySelection> {
    let days = split_list(days);
    DaySelection::parse(days.as_deref(), days_from, days_to)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostsParams {
    pub days: Option<String>,
    pub days_from: Option<String>,
    pub days_to: Option<String>,
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub has_videos: Option<bool>,
    pub countries: Option<String>,
    pub categories: Option<String>,
    pub post_ids: Option<String>,
    pub fields: Option<String>,
    pub exclude: Option<String>,
    pub adjacent: Option<usize>,
    pub similar: Option<String>,
}

impl PostsParams {
    pub fn to_query(&self, config: &EngineConfig) -> Result<SearchQuery> {
        let similar = match split_list(self.similar.as_deref()) {
            None => config.similar_fields.clone(),
            Some(names) => names
                .iter()
                .filter_map(|name| match name.parse() {
                    Ok(field) => Some(field),
                    Err(e) => {
                        tracing::warn!("Ignoring similar={}: {}", name, e);
                        None
                    }
                })
                .collect(),
        };

        Ok(SearchQuery {
            days: day_selection(
                self.days.as_deref(),
                self.days_from.as_deref(),
                self.days_to.as_deref(),
            )?,
            limit: Some(self.limit.unwrap_or(config.page_size)),
            filter: PostFilter {
                post_type: self.post_type.clone(),
                has_videos: self.has_videos,
                countries: split_list(self.countries.as_deref()),
                categories: split_list(self.categories.as_deref()),
                post_ids: split_list(self.post_ids.as_deref()),
            },
            fields: split_list(self.fields.as_deref()),
            exclude: split_list(self.exclude.as_deref()).unwrap_or_default(),
            adjacent: self.adjacent.unwrap_or(0),
            similar,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub count: usize,
    pub posts: Vec<ExpandedPost>,
}

pub async fn handle_posts(
    Query(params): Query<PostsParams>,
    Extension(engine): Extension<Arc<Engine>>,
) -> std::result::Result<(StatusCode, Json<PostsResponse>), EngineError> {
    let query = params.to_query(engine.config())?;
    let posts: Vec<ExpandedPost> = engine.search(query).try_collect().await?;

    tracing::info!("GET /posts returned {} posts", posts.len());
    Ok((
        StatusCode::OK,
        Json(PostsResponse {
            count: posts.len(),
            posts,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostParams {
    pub adjacent: Option<usize>,
}

pub async fn handle_post(
    Path(post_id): Path<String>,
    Query(params): Query<PostParams>,
    Extension(engine): Extension<Arc<Engine>>,
) -> std::result::Result<(StatusCode, Json<Option<ExpandedPost>>), EngineError> {
    match engine.find_post(&post_id, params.adjacent).await? {
        Some(post) => Ok((StatusCode::OK, Json(Some(post)))),
        // a missing post is an empty answer, not a failed request
        None => {
            tracing::debug!("GET /post/{}: not found", post_id);
            Ok((StatusCode::OK, Json(None)))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DaysParams {
    pub days: Option<String>,
    pub days_from: Option<String>,
    pub days_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

pub async fn handle_tags(
    Query(params): Query<DaysParams>,
    Extension(engine): Extension<Arc<Engine>>,
) -> std::result::Result<(StatusCode, Json<TagsResponse>), EngineError> {
    let days = day_selection(
        params.days.as_deref(),
        params.days_from.as_deref(),
        params.days_to.as_deref(),
    )?;
    let tags = engine.distinct_tags(&days).await?;
    Ok((StatusCode::OK, Json(TagsResponse { tags })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsParams {
    pub days: Option<String>,
    pub days_from: Option<String>,
    pub days_to: Option<String>,
    pub limit: Option<usize>,
    pub recursive: bool,
}

pub async fn handle_stats(
    Query(params): Query<StatsParams>,
    Extension(engine): Extension<Arc<Engine>>,
) -> std::result::Result<(StatusCode, Json<PostStats>), EngineError> {
    let days = day_selection(
        params.days.as_deref(),
        params.days_from.as_deref(),
        params.days_to.as_deref(),
    )?;
    let stats = engine
        .compile_stats(days, params.limit, params.recursive)
        .await?;
    Ok((StatusCode::OK, Json(stats)))
}
