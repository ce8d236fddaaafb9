use axum::{
    extract::{FromRef, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::html::{auth_layout, document, escape};
use crate::{
    auth::{
        require_unauth,
        services::{authenticate, register, session_cookie, JwtKeys},
    },
    db::UserRecord,
    error::{AppError, HOME_PATH},
    rpc::Context,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn login_form(error: Option<&str>) -> String {
    form_page(
        "Login",
        "/login",
        r#"<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>"#,
        r#"Don't have an account? <a href="/signup">Sign up</a>"#,
        error,
    )
}

fn signup_form(error: Option<&str>) -> String {
    form_page(
        "Sign up",
        "/signup",
        r#"<label>Name <input type="text" name="name"></label>
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" minlength="8" required></label>"#,
        r#"Already have an account? <a href="/login">Login</a>"#,
        error,
    )
}

fn form_page(title: &str, action: &str, fields: &str, footer: &str, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p role="alert" class="error">{}</p>"#, escape(e)))
        .unwrap_or_default();
    let card = format!(
        r#"<form method="post" action="{action}" class="flex flex-col gap-4">
<h1>{title}</h1>
{error}
{fields}
<button type="submit">{title}</button>
<p>{footer}</p>
</form>"#
    );
    document(title, &auth_layout(&card))
}

/// Credential failures re-render the form; anything else propagates.
fn form_error(err: AppError, render: fn(Option<&str>) -> String) -> Response {
    let status = err.status();
    match err {
        AppError::Validation(msg) | AppError::Unauthorized(msg) | AppError::Conflict(msg) => {
            (status, Html(render(Some(&msg)))).into_response()
        }
        other => other.into_response(),
    }
}

fn sign_in_and_redirect(state: &AppState, user: UserRecord) -> Result<Response, AppError> {
    let keys = JwtKeys::from_ref(state);
    let auth = keys.issue(user)?;
    let cookie = session_cookie(&auth.access_token, keys.access_ttl, state.config.serves_https());
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(HOME_PATH)).into_response())
}

#[instrument(skip_all)]
pub async fn login_page(ctx: Context) -> Result<Html<String>, AppError> {
    require_unauth(&ctx)?;
    Ok(Html(login_form(None)))
}

#[instrument(skip_all)]
pub async fn signup_page(ctx: Context) -> Result<Html<String>, AppError> {
    require_unauth(&ctx)?;
    Ok(Html(signup_form(None)))
}

#[instrument(skip_all)]
pub async fn login_submit(
    State(state): State<AppState>,
    ctx: Context,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    require_unauth(&ctx)?;
    match authenticate(&state, &form.email, &form.password).await {
        Ok(user) => sign_in_and_redirect(&state, user),
        Err(e) => Ok(form_error(e, login_form)),
    }
}

#[instrument(skip_all)]
pub async fn signup_submit(
    State(state): State<AppState>,
    ctx: Context,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    require_unauth(&ctx)?;
    match register(&state, &form.email, &form.password, form.name.as_deref()).await {
        Ok(user) => {
            info!(user_id = user.id, "signed up from form");
            sign_in_and_redirect(&state, user)
        }
        Err(e) => Ok(form_error(e, signup_form)),
    }
}
