use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::error::{AppError, ErrorBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Error recorded in the cache and handed to suspending readers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct QueryError {
    pub code: String,
    pub message: String,
}

impl QueryError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_SERVER_ERROR", message)
    }
}

impl From<ErrorBody> for QueryError {
    fn from(b: ErrorBody) -> Self {
        Self::new(b.code, b.message)
    }
}

impl From<AppError> for QueryError {
    fn from(e: AppError) -> Self {
        e.body().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<QueryError>,
    /// Unix milliseconds of the last successful fetch, 0 when never fetched.
    pub data_updated_at: i64,
    pub error_updated_at: i64,
    pub failure_count: u32,
    pub is_invalidated: bool,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            data_updated_at: 0,
            error_updated_at: 0,
            failure_count: 0,
            is_invalidated: false,
        }
    }
}

impl QueryState {
    pub fn is_stale(&self, stale_time_ms: i64, now_ms: i64) -> bool {
        self.data.is_none() || self.is_invalidated || now_ms - self.data_updated_at >= stale_time_ms
    }

    pub(crate) fn succeed(&mut self, data: Value, now_ms: i64) {
        self.status = QueryStatus::Success;
        self.data = Some(data);
        self.error = None;
        self.data_updated_at = now_ms;
        self.failure_count = 0;
        self.is_invalidated = false;
    }

    pub(crate) fn fail(&mut self, error: QueryError, failures: u32, now_ms: i64) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
        self.error_updated_at = now_ms;
        self.failure_count = failures;
    }
}

pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
