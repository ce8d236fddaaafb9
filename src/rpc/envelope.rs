use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, ErrorBody};

/// One call in a `POST /api/trpc` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub procedure: String,
    #[serde(default)]
    pub input: Value,
}

/// Per-call reply: `{ "result": .. }` or `{ "error": { "code", "message" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Result { result: Value },
    Error { error: ErrorBody },
}

impl ResponseEnvelope {
    pub fn is_error(&self) -> bool {
        matches!(self, ResponseEnvelope::Error { .. })
    }

    pub fn into_result(self) -> Result<Value, ErrorBody> {
        match self {
            ResponseEnvelope::Result { result } => Ok(result),
            ResponseEnvelope::Error { error } => Err(error),
        }
    }
}

impl From<Result<Value, AppError>> for ResponseEnvelope {
    fn from(r: Result<Value, AppError>) -> Self {
        match r {
            Ok(result) => ResponseEnvelope::Result { result },
            Err(e) => ResponseEnvelope::Error { error: e.body() },
        }
    }
}
