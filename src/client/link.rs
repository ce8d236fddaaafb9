use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    cache::{is_empty_input, QueryError},
    config::AppConfig,
    rpc::{envelope::ResponseEnvelope, http::TRPC_PREFIX, Caller},
};

pub const LINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport for procedure calls made by a query cache.
#[async_trait]
pub trait Link: Send + Sync {
    async fn query(&self, procedure: &str, input: Value) -> Result<Value, QueryError>;
}

/// The server renders through the direct caller instead of looping back over HTTP.
#[async_trait]
impl Link for Caller {
    async fn query(&self, procedure: &str, input: Value) -> Result<Value, QueryError> {
        self.call(procedure, input).await.map_err(QueryError::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Browser,
    Server,
}

/// Origin the bridge is reached at. Empty means relative to the current page.
pub fn resolve_base_url(runtime: Runtime, config: &AppConfig) -> String {
    match runtime {
        Runtime::Browser => String::new(),
        Runtime::Server => match &config.public_host {
            Some(host) => format!("https://{host}"),
            None => format!("http://localhost:{}", config.port),
        },
    }
}

/// Calls `GET /api/trpc/{procedure}` and unwraps the response envelope.
#[derive(Clone)]
pub struct HttpLink {
    http: reqwest::Client,
    base_url: String,
}

impl HttpLink {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(LINK_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport_error(e: reqwest::Error) -> QueryError {
    if e.is_timeout() {
        QueryError::new("TIMEOUT", "request to the bridge timed out")
    } else {
        QueryError::new("NETWORK_ERROR", e.to_string())
    }
}

#[async_trait]
impl Link for HttpLink {
    #[instrument(skip(self, input), fields(base = %self.base_url))]
    async fn query(&self, procedure: &str, input: Value) -> Result<Value, QueryError> {
        let url = format!("{}{}/{}", self.base_url, TRPC_PREFIX, procedure);
        let mut req = self.http.get(&url);
        if !is_empty_input(&input) {
            req = req.query(&[("input", input.to_string())]);
        }

        let res = req.send().await.map_err(|e| {
            warn!(error = %e, "bridge request failed");
            transport_error(e)
        })?;
        let status = res.status();
        let envelope: ResponseEnvelope = res.json().await.map_err(|e| {
            warn!(%status, error = %e, "unreadable bridge response");
            QueryError::new("PARSE_ERROR", format!("unreadable response ({status}): {e}"))
        })?;
        debug!(%status, error = envelope.is_error(), "bridge responded");
        envelope.into_result().map_err(QueryError::from)
    }
}
