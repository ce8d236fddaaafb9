use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::html::escape;
use crate::{
    cache::{DehydratedState, QueryClient, QueryClientConfig, QueryError, QueryOptions},
    client::{query_options, Link},
    db::User,
    rpc::GET_USERS,
};

pub const LOADING_FALLBACK: &str = "<p>Loading...</p>";

/// Renders a fallback in place of a view whose read failed.
pub struct ErrorBoundary {
    fallback: fn(&QueryError) -> String,
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self {
            fallback: |e| {
                format!(
                    r#"<div role="alert" class="error" data-code="{}">Something went wrong: {}</div>"#,
                    escape(&e.code),
                    escape(&e.message)
                )
            },
        }
    }
}

impl ErrorBoundary {
    pub fn new(fallback: fn(&QueryError) -> String) -> Self {
        Self { fallback }
    }

    pub fn render(&self, view: Result<String, QueryError>) -> String {
        view.unwrap_or_else(|e| {
            warn!(code = %e.code, error = %e.message, "view failed; rendering fallback");
            (self.fallback)(&e)
        })
    }
}

/// The user list, bound to a query cache and the link that fills it.
#[derive(Clone)]
pub struct UsersView {
    client: QueryClient,
    options: QueryOptions,
}

impl UsersView {
    pub fn new(client: QueryClient, link: Arc<dyn Link>) -> Self {
        Self {
            client,
            options: query_options(link, GET_USERS, Value::Null),
        }
    }

    /// Boots a view from a server-rendered page: a fresh browser cache seeded
    /// with the snapshot embedded in `html`.
    pub fn mount(html: &str, link: Arc<dyn Link>) -> Self {
        Self::mount_with_config(html, link, QueryClientConfig::browser())
    }

    pub fn mount_with_config(html: &str, link: Arc<dyn Link>, config: QueryClientConfig) -> Self {
        let view = Self::new(QueryClient::new(config), link);
        match DehydratedState::extract_from_html(html) {
            Some(snapshot) => view.hydrate(snapshot),
            None => debug!("page carries no query snapshot"),
        }
        view
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn hydrate(&self, snapshot: DehydratedState) {
        self.client.hydrate(snapshot);
    }

    pub async fn prefetch(&self) {
        self.client.prefetch_query(&self.options).await;
    }

    /// Suspending read. Resolves from the cache when fresh, otherwise through the link.
    pub async fn users(&self) -> Result<Vec<User>, QueryError> {
        self.client.suspense_query(&self.options).await
    }

    pub async fn render(&self) -> Result<String, QueryError> {
        Ok(users_markup(&self.users().await?))
    }

    pub async fn render_in(&self, boundary: &ErrorBoundary) -> String {
        boundary.render(self.render().await)
    }

    /// Render without waiting: settled data or the loading fallback.
    pub fn render_from_cache(&self) -> String {
        match self.client.get_query_data_as::<Vec<User>>(&self.options.key) {
            Some(users) => users_markup(&users),
            None => LOADING_FALLBACK.to_string(),
        }
    }
}

fn users_markup(users: &[User]) -> String {
    let json = serde_json::to_string(users).unwrap_or_else(|_| "[]".into());
    format!(r#"<div class="users">{}</div>"#, escape(&json))
}
