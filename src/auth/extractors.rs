use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, rpc::create_context, state::AppState};

/// Extracts and validates the session, returning the user ID.
pub struct AuthUser(pub i32);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        create_context(&parts.headers, state)
            .session_user
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Invalid or missing session".into()))
    }
}
