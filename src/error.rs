use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no procedure named `{0}`")]
    ProcedureNotFound(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("procedure `{procedure}` does not support {method} requests")]
    MethodNotSupported { procedure: String, method: String },
    #[error("procedure `{0}` timed out after {1:?}")]
    Timeout(String, Duration),
    #[error("authentication required")]
    AuthRequired,
    #[error("already authenticated")]
    AlreadyAuthenticated,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error half of the bridge envelope: `{ "error": { "code", "message" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ProcedureNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotSupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Timeout(..) => StatusCode::GATEWAY_TIMEOUT,
            AppError::AuthRequired | AppError::AlreadyAuthenticated => StatusCode::SEE_OTHER,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Store(_) | AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
            AppError::ProcedureNotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::MethodNotSupported { .. } => "METHOD_NOT_SUPPORTED",
            AppError::Timeout(..) => "TIMEOUT",
            AppError::AuthRequired | AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::AlreadyAuthenticated => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
        }
    }

    /// Client-facing body. Store failures are logged in full but reported generically.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            AppError::Store(e) => {
                tracing::error!(error = %e, "store error");
                "failed to load data from the store".to_string()
            }
            other => other.to_string(),
        };
        ErrorBody {
            code: self.code().into(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::AuthRequired => Redirect::to(LOGIN_PATH).into_response(),
            AppError::AlreadyAuthenticated => Redirect::to(HOME_PATH).into_response(),
            other => {
                let status = other.status();
                (status, Json(ErrorEnvelope { error: other.body() })).into_response()
            }
        }
    }
}
