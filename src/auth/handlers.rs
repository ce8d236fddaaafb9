use axum::{
    extract::{FromRef, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, RefreshRequest, SignInRequest, SignUpRequest},
        extractors::AuthUser,
        services::{authenticate, clear_session_cookie, register, session_cookie, JwtKeys},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/sign-up/email", post(sign_up))
        .route("/api/auth/sign-in/email", post(sign_in))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/session", get(get_session))
}

/// Signs the response in: JSON tokens plus the session cookie.
fn signed_in(state: &AppState, keys: &JwtKeys, auth: AuthResponse) -> impl IntoResponse {
    let cookie = session_cookie(&auth.access_token, keys.access_ttl, state.config.serves_https());
    ([(header::SET_COOKIE, cookie)], Json(auth))
}

/// Creates the account and signs it in straight away.
#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = register(&state, &payload.email, &payload.password, payload.name.as_deref()).await?;
    let keys = JwtKeys::from_ref(&state);
    let auth = keys.issue(user)?;
    Ok(signed_in(&state, &keys, auth))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&state, &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    let auth = keys.issue(user)?;
    Ok(signed_in(&state, &keys, auth))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    let auth = keys.issue(user)?;
    Ok(signed_in(&state, &keys, auth))
}

#[instrument(skip(state))]
pub async fn sign_out(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = clear_session_cookie(state.config.serves_https());
    ([(header::SET_COOKIE, cookie)], Json(serde_json::json!({ "success": true })))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state.store.find_by_id(user_id).await?.ok_or_else(|| {
        error!(user_id, "session user not found");
        AppError::Unauthorized("User not found".into())
    })?;
    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::db::memory::MemoryUserStore;

    async fn call(state: &AppState, method: Method, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value, Option<String>) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        let res = auth_routes()
            .with_state(state.clone())
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null), cookie)
    }

    #[tokio::test]
    async fn sign_up_signs_in_and_session_resolves() {
        let state = AppState::fake_with_store(Arc::new(MemoryUserStore::new()));
        let (status, body, cookie) = call(
            &state,
            Method::POST,
            "/api/auth/sign-up/email",
            json!({ "email": " New@Example.com ", "password": "long-enough", "name": "New" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "new@example.com");
        assert!(cookie.unwrap().starts_with("session_token="));

        let token = body["access_token"].as_str().unwrap();
        let (status, me, _) = call(&state, Method::GET, "/api/auth/session", Value::Null, Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "New");
    }

    #[tokio::test]
    async fn duplicate_sign_up_conflicts() {
        let state = AppState::fake();
        let body = json!({ "email": "a@b.co", "password": "long-enough" });
        call(&state, Method::POST, "/api/auth/sign-up/email", body.clone(), None).await;
        let (status, err, _) = call(&state, Method::POST, "/api/auth/sign-up/email", body, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn sign_in_rejects_bad_password() {
        let state = AppState::fake();
        let body = json!({ "email": "a@b.co", "password": "long-enough" });
        call(&state, Method::POST, "/api/auth/sign-up/email", body, None).await;

        let (status, _, _) = call(
            &state,
            Method::POST,
            "/api/auth/sign-in/email",
            json!({ "email": "a@b.co", "password": "wrong-password" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body, _) = call(
            &state,
            Method::POST,
            "/api/auth/sign-in/email",
            json!({ "email": "a@b.co", "password": "long-enough" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["refresh_token"].is_string());
    }

    #[tokio::test]
    async fn refresh_requires_refresh_token() {
        let state = AppState::fake();
        let (_, body, _) = call(
            &state,
            Method::POST,
            "/api/auth/sign-up/email",
            json!({ "email": "a@b.co", "password": "long-enough" }),
            None,
        )
        .await;

        let access = body["access_token"].as_str().unwrap();
        let (status, _, _) = call(&state, Method::POST, "/api/auth/refresh", json!({ "refresh_token": access }), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let refresh = body["refresh_token"].as_str().unwrap();
        let (status, _, _) = call(&state, Method::POST, "/api/auth/refresh", json!({ "refresh_token": refresh }), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn session_without_token_is_unauthorized() {
        let state = AppState::fake();
        let (status, _, _) = call(&state, Method::GET, "/api/auth/session", Value::Null, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_out_clears_cookie() {
        let state = AppState::fake();
        let (status, _, cookie) = call(&state, Method::POST, "/api/auth/sign-out", Value::Null, None).await;
        assert_eq!(status, StatusCode::OK);
        let cookie = cookie.unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn public_deployment_sets_secure_cookie() {
        let base = AppState::fake();
        let mut config = (*base.config).clone();
        config.public_host = Some("nodebase.vercel.app".into());
        let state = AppState::from_parts(base.store.clone(), Arc::new(config));

        let (status, _, cookie) = call(
            &state,
            Method::POST,
            "/api/auth/sign-up/email",
            json!({ "email": "a@b.co", "password": "long-enough" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.unwrap().ends_with("; Secure"));
    }
}
