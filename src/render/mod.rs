//! Server-rendered pages and the client-side user view they hydrate.

mod auth_pages;
mod home;
pub mod html;
mod protected;
mod users_view;

pub use home::render_home;
pub use users_view::{ErrorBoundary, UsersView, LOADING_FALLBACK};

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/protected", get(protected::protected))
        .route("/login", get(auth_pages::login_page).post(auth_pages::login_submit))
        .route("/signup", get(auth_pages::signup_page).post(auth_pages::signup_submit))
}
