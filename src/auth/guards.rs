//! Page-level route guards. Failures render as redirects, not error codes.

use crate::{error::AppError, rpc::Context};

/// Passes only with a session; otherwise the page redirects to the login form.
pub fn require_auth(ctx: &Context) -> Result<i32, AppError> {
    ctx.session_user.ok_or(AppError::AuthRequired)
}

/// Passes only without a session; signed-in users are sent home.
pub fn require_unauth(ctx: &Context) -> Result<(), AppError> {
    if ctx.is_authenticated() {
        return Err(AppError::AlreadyAuthenticated);
    }
    Ok(())
}
