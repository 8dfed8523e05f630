use super::filter::PostFilter;
use super::search::SearchQuery;
use super::types::{POST_ACTIONS, Post, STATS};
use crate::days::DaySelection;
use crate::engine::Engine;
use crate::error::Result;

use futures::TryStreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

// `.../post/<id>`: first match wins
static POST_URL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"post/(\w*)").expect("Invalid post url regex"));

/// Post identifier targeted by a tracked URL, if any.
pub fn parse_post_url(url: &str) -> Option<&str> {
    POST_URL_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Event records of `action` on `post`.
///
/// Records point at the URL they were taken on (`on.name`). Unless
/// `recursive`, only records on the post's own page are kept, dropping those
/// on links embedded in it.
pub fn stats_for_action(post: &Post, action: &str, recursive: bool) -> Vec<Value> {
    let Some(records) = post
        .get(STATS)
        .and_then(|stats| stats.get(action))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    if recursive {
        return records.clone();
    }

    records
        .iter()
        .filter(|record| {
            let url = record
                .get("on")
                .and_then(|on| on.get("name"))
                .and_then(Value::as_str);
            url.and_then(parse_post_url).is_some_and(|id| Some(id) == post.id())
        })
        .cloned()
        .collect()
}

/// Event records per action, over a set of posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PostStats(BTreeMap<String, Vec<Value>>);

impl PostStats {
    pub fn get(&self, action: &str) -> &[Value] {
        self.0.get(action).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Engine {
    /// Compiles the recorded actions of the posts in `days`, reading at most
    /// `limit` posts per collection.
    pub async fn compile_stats(
        &self,
        days: DaySelection,
        limit: Option<usize>,
        recursive: bool,
    ) -> Result<PostStats> {
        let query = SearchQuery {
            days,
            limit,
            filter: PostFilter::default(),
            similar: Vec::new(),
            ..SearchQuery::default()
        };
        let posts: Vec<Post> = self
            .search(query)
            .map_ok(|expanded| expanded.post)
            .try_collect()
            .await?;

        let mut stats = BTreeMap::new();
        for action in POST_ACTIONS {
            let records: Vec<Value> = posts
                .iter()
                .flat_map(|post| stats_for_action(post, action, recursive))
                .collect();
            stats.insert(action.to_string(), records);
        }

        tracing::info!("Compiled stats over {} posts", posts.len());
        Ok(PostStats(stats))
    }
}
