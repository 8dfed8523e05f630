//! Error types for the query engine.
//!
//! `StoreError` is what a `DocumentStore` adapter reports; the engine wraps it
//! unmodified in `EngineError::Store` and never retries.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures surfaced by a document store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("document store timed out after {0:?}")]
    Timeout(Duration),

    /// The filter or pipeline was rejected by the store.
    #[error("invalid store query: {0}")]
    Query(String),
}

impl StoreError {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `days_from` is after `days_to`.
    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    /// A day parameter is not a `YYYY-MM-DD` date.
    #[error("invalid day '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A document identifier is not 24 hex characters.
    #[error("invalid document identifier: '{0}'")]
    InvalidIdentifier(String),

    /// The document has no internal `_id` key, so it went through the formatter already.
    #[error("document has no internal `_id`: already formatted")]
    AlreadyFormatted,

    /// The sum-by field does not belong to the grouped relation.
    #[error("cannot sum by {sum_by} when grouping by {group_by}")]
    InvalidAggregation {
        group_by: &'static str,
        sum_by: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// HTTP status the transport layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRange { .. }
            | Self::InvalidDate(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidAggregation { .. } => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(StoreError::Query(_)) | Self::AlreadyFormatted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Body of every non-2xx HTTP response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
