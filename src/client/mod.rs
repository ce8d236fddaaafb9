//! Consumer side of the bridge: links that carry procedure calls, and the
//! query options that bind them to the cache.

mod link;

pub use link::{resolve_base_url, HttpLink, Link, Runtime, LINK_TIMEOUT};

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{QueryKey, QueryOptions};

/// Cache options for one procedure call routed through `link`.
pub fn query_options(link: Arc<dyn Link>, procedure: &str, input: Value) -> QueryOptions {
    let key = QueryKey::procedure(procedure, &input);
    let procedure = procedure.to_string();
    QueryOptions::new(key, move || {
        let link = link.clone();
        let procedure = procedure.clone();
        let input = input.clone();
        async move { link.query(&procedure, input).await }
    })
}
