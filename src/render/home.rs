use std::sync::Arc;

use axum::{extract::State, response::Html};
use tracing::{info, instrument};

use super::{html::document, users_view::UsersView};
use crate::{
    cache::{QueryClient, QueryClientConfig, STATE_ELEMENT_ID},
    error::AppError,
    rpc::{Caller, Context},
    state::AppState,
};

const CONTENT_SLOT: &str = "<!--content-->";

#[instrument(skip_all, fields(caller = %ctx.caller_id))]
pub async fn home(State(state): State<AppState>, ctx: Context) -> Result<Html<String>, AppError> {
    render_home(&state, ctx).await.map(Html)
}

/// Server render of `/`: prefetch into a request-scoped cache, then ship the
/// snapshot alongside markup rendered from that same cache.
pub async fn render_home(state: &AppState, ctx: Context) -> Result<String, AppError> {
    info!(phase = "start", "rendering home");
    let client = QueryClient::new(QueryClientConfig::server());
    let caller = Caller::new(state.registry.clone(), ctx);
    let view = UsersView::new(client.clone(), Arc::new(caller));

    let prefetch = tokio::spawn({
        let view = view.clone();
        async move { view.prefetch().await }
    });
    info!(phase = "prefetch-issued");

    // Built while the prefetch runs.
    let shell = document(
        "NodeBase",
        &format!(r#"<div class="h-screen flex justify-center items-center">{CONTENT_SLOT}</div>"#),
    );

    prefetch
        .await
        .map_err(|e| AppError::Internal(format!("prefetch task failed: {e}")))?;

    let snapshot = client.dehydrate();
    info!(phase = "dehydrate", queries = snapshot.queries.len());
    let state_json = snapshot
        .to_script_json()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let content = format!(
        r#"
<script type="application/json" id="{STATE_ELEMENT_ID}">{state_json}</script>
{}
"#,
        view.render_from_cache()
    );
    info!(phase = "emit-html");
    Ok(shell.replacen(CONTENT_SLOT, &content, 1))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        cache::DehydratedState,
        client::{testing::CountingLink, HttpLink},
        db::memory::MemoryUserStore,
        render::{users_view::LOADING_FALLBACK, ErrorBoundary},
        rpc::http::trpc_routes,
    };

    fn anonymous() -> Context {
        Context::anonymous("user_123")
    }

    #[tokio::test]
    async fn users_visible_after_hydration_without_network() {
        let state = AppState::fake_with_store(Arc::new(MemoryUserStore::with_users(3)));
        let html = render_home(&state, anonymous()).await.unwrap();
        assert!(html.contains("user1@example.com"));
        assert!(!html.contains(LOADING_FALLBACK));

        let link = Arc::new(CountingLink::new(Ok(json!([]))));
        let view = UsersView::mount(&html, link.clone());
        let users = view.users().await.unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(users[2].email, "user3@example.com");
        assert_eq!(link.count(), 0);
    }

    #[tokio::test]
    async fn empty_store_renders_no_records() {
        let state = AppState::fake_with_store(Arc::new(MemoryUserStore::new()));
        let html = render_home(&state, anonymous()).await.unwrap();
        assert!(html.contains(r#"<div class="users">[]</div>"#));

        let snapshot = DehydratedState::extract_from_html(&html).unwrap();
        assert_eq!(snapshot.queries.len(), 1);
        assert_eq!(snapshot.queries[0].state.data, Some(Value::Array(vec![])));

        let link = Arc::new(CountingLink::new(Ok(json!(["unexpected"]))));
        let users = UsersView::mount(&html, link.clone()).users().await.unwrap();
        assert!(users.is_empty());
        assert_eq!(link.count(), 0);
    }

    #[tokio::test]
    async fn store_error_still_renders_and_client_sees_it() {
        let store = Arc::new(MemoryUserStore::new());
        store.set_failing(true);
        let state = AppState::fake_with_store(store.clone());

        let html = render_home(&state, anonymous()).await.unwrap();
        assert!(html.contains(LOADING_FALLBACK));
        let snapshot = DehydratedState::extract_from_html(&html).unwrap();
        assert!(snapshot.queries.is_empty());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = trpc_routes().with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let link = Arc::new(HttpLink::new(format!("http://{addr}")).unwrap());
        let config = QueryClientConfig {
            retry_base_delay: Duration::from_millis(1),
            ..QueryClientConfig::browser()
        };
        let view = UsersView::mount_with_config(&html, link, config);
        let err = view.users().await.unwrap_err();
        assert_eq!(err.code, "INTERNAL_SERVER_ERROR");

        let rendered = view.render_in(&ErrorBoundary::default()).await;
        assert!(rendered.contains(r#"role="alert""#));
        // one prefetch, then three client attempts for each of the two reads
        assert_eq!(store.list_calls(), 7);
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_store_call() {
        let store = Arc::new(MemoryUserStore::with_users(2).delayed(Duration::from_millis(50)));
        let state = AppState::fake_with_store(store.clone());
        let caller = Caller::new(state.registry.clone(), anonymous());
        let view = UsersView::new(QueryClient::new(QueryClientConfig::browser()), Arc::new(caller));

        let reads = (0..5).map(|_| {
            let view = view.clone();
            tokio::spawn(async move { view.users().await })
        });
        for read in futures::future::join_all(reads).await {
            assert_eq!(read.unwrap().unwrap().len(), 2);
        }
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn slow_prefetch_fills_the_prebuilt_shell() {
        let store = Arc::new(MemoryUserStore::with_users(1).delayed(Duration::from_millis(30)));
        let state = AppState::fake_with_store(store.clone());
        let html = render_home(&state, anonymous()).await.unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!html.contains(CONTENT_SLOT));
        assert!(html.contains("user1@example.com"));
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn each_render_uses_a_fresh_cache() {
        let store = Arc::new(MemoryUserStore::with_users(1));
        let state = AppState::fake_with_store(store.clone());
        render_home(&state, anonymous()).await.unwrap();
        render_home(&state, anonymous()).await.unwrap();
        assert_eq!(store.list_calls(), 2);
    }
}
