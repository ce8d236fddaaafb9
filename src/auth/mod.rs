use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod guards;
pub mod handlers;
pub mod services;

pub use guards::{require_auth, require_unauth};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
