use axum::{extract::State, response::Html};
use tracing::instrument;

use super::html::{document, escape};
use crate::{
    auth::require_auth,
    error::AppError,
    rpc::{Caller, Context},
    state::AppState,
};

/// `/protected`: signed-in users only; loads through the direct caller, no cache.
#[instrument(skip_all, fields(caller = %ctx.caller_id))]
pub async fn protected(State(state): State<AppState>, ctx: Context) -> Result<Html<String>, AppError> {
    require_auth(&ctx)?;
    let users = Caller::new(state.registry.clone(), ctx).get_users().await?;
    let json = serde_json::to_string(&users).map_err(|e| AppError::Internal(e.to_string()))?;
    let body = format!(
        r#"<div class="h-screen flex justify-center items-center flex-col gap-y-6">
Protected <div>{}</div>
<form method="post" action="/api/auth/sign-out"><button type="submit">Sign out</button></form>
</div>"#,
        escape(&json)
    );
    Ok(Html(document("Protected", &body)))
}
