use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;
use tracing::debug;

use crate::{
    auth::services::{session_token, JwtKeys, TokenKind},
    state::AppState,
};

/// Per-request execution context handed to every procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub caller_id: String,
    /// Authenticated user, when the request carries a valid session.
    pub session_user: Option<i32>,
}

impl Context {
    pub fn anonymous(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            session_user: None,
        }
    }

    pub fn for_user(user_id: i32) -> Self {
        Self {
            caller_id: user_id.to_string(),
            session_user: Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_user.is_some()
    }
}

/// Builds the context from request headers alone, so repeated calls for one
/// request yield equal values.
pub fn create_context(headers: &HeaderMap, state: &AppState) -> Context {
    let anonymous = || Context::anonymous(state.config.anonymous_caller_id.clone());
    let Some(token) = session_token(headers) else {
        return anonymous();
    };
    let keys = JwtKeys::from_ref(state);
    match keys.verify(token) {
        Ok(claims) if claims.kind == TokenKind::Access => Context::for_user(claims.sub),
        Ok(_) => {
            debug!("refresh token presented as session; treating caller as anonymous");
            anonymous()
        }
        Err(e) => {
            debug!(error = %e, "invalid session token; treating caller as anonymous");
            anonymous()
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Context {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(create_context(&parts.headers, state))
    }
}
