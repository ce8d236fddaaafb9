use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use futures::{future::BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{
    hydration::{DehydratedQuery, DehydratedState},
    key::QueryKey,
    state::{now_ms, QueryError, QueryState, QueryStatus},
};

pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync>;

/// A cache key bound to the function that loads it.
#[derive(Clone)]
pub struct QueryOptions {
    pub key: QueryKey,
    pub query_fn: QueryFn,
}

impl QueryOptions {
    pub fn new<F, Fut>(key: QueryKey, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, QueryError>> + Send + 'static,
    {
        Self {
            key,
            query_fn: Arc::new(move || f().boxed()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryClientConfig {
    pub stale_time: Duration,
    pub gc_time: Duration,
    /// Additional attempts after the first failure.
    pub retry: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

impl QueryClientConfig {
    /// Request-scoped cache used while rendering. Failures surface immediately.
    pub fn server() -> Self {
        Self {
            retry: 0,
            ..Self::browser()
        }
    }

    /// Long-lived cache on the consuming side: two retries with backoff, then surface.
    pub fn browser() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            gc_time: DEFAULT_GC_TIME,
            retry: 2,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_secs(30),
        }
    }

    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_base_delay
            .saturating_mul(factor)
            .min(self.retry_max_delay)
    }
}

type Outcome = Option<Result<Value, QueryError>>;

/// A running fetch. Only the fetch an entry currently points at may settle it.
struct InFlight {
    id: u64,
    rx: watch::Receiver<Outcome>,
    /// Invalidated after this fetch started; its result lands already stale.
    invalidated: bool,
}

struct Entry {
    key: QueryKey,
    state: QueryState,
    in_flight: Option<InFlight>,
    last_access: Instant,
}

impl Entry {
    fn new(key: QueryKey) -> Self {
        Self {
            key,
            state: QueryState::default(),
            in_flight: None,
            last_access: Instant::now(),
        }
    }
}

struct Inner {
    config: QueryClientConfig,
    entries: Mutex<HashMap<String, Entry>>,
    next_fetch_id: AtomicU64,
}

/// Read-through cache of procedure results. Cloning shares the same entries.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(config: QueryClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                entries: Mutex::new(HashMap::new()),
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &QueryClientConfig {
        &self.inner.config
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns fresh cached data, or joins/starts a fetch and waits for it.
    ///
    /// Concurrent calls for one key share a single in-flight fetch. The fetch runs on
    /// its own task, so dropping the returned future does not cancel it.
    pub async fn fetch_query(&self, options: &QueryOptions) -> Result<Value, QueryError> {
        let hash = options.key.hash();
        let rx = {
            let mut entries = self.entries();
            let entry = entries
                .entry(hash.clone())
                .or_insert_with(|| Entry::new(options.key.clone()));
            entry.last_access = Instant::now();

            let stale_ms = self.inner.config.stale_time.as_millis() as i64;
            if !entry.state.is_stale(stale_ms, now_ms()) {
                if let Some(data) = &entry.state.data {
                    debug!(key = %hash, "query cache hit");
                    return Ok(data.clone());
                }
            }

            let joined = entry.in_flight.as_ref().map(|f| f.rx.clone());
            if let Some(rx) = joined {
                debug!(key = %hash, "joining in-flight fetch");
                rx
            } else {
                self.spawn_fetch(hash.clone(), entry, options.query_fn.clone())
            }
        };

        wait(rx).await
    }

    /// Like [`fetch_query`](Self::fetch_query), but stale data is returned right away
    /// while a background refetch revalidates it.
    pub async fn read_query(&self, options: &QueryOptions) -> Result<Value, QueryError> {
        {
            let mut entries = self.entries();
            if let Some(entry) = entries.get_mut(&options.key.hash()) {
                entry.last_access = Instant::now();
                if let Some(data) = entry.state.data.clone() {
                    let stale_ms = self.inner.config.stale_time.as_millis() as i64;
                    if entry.state.is_stale(stale_ms, now_ms()) && entry.in_flight.is_none() {
                        debug!(key = %options.key.hash(), "revalidating stale entry");
                        self.spawn_fetch(options.key.hash(), entry, options.query_fn.clone());
                    }
                    return Ok(data);
                }
            }
        }
        self.fetch_query(options).await
    }

    /// Warms the cache. Failures are recorded on the entry, never returned.
    pub async fn prefetch_query(&self, options: &QueryOptions) {
        if let Err(e) = self.fetch_query(options).await {
            debug!(key = %options.key.hash(), error = %e, "prefetch failed");
        }
    }

    /// Suspending read: waits for the entry to settle and decodes it.
    pub async fn suspense_query<T: DeserializeOwned>(
        &self,
        options: &QueryOptions,
    ) -> Result<T, QueryError> {
        let data = self.read_query(options).await?;
        serde_json::from_value(data).map_err(|e| QueryError::internal(e.to_string()))
    }

    fn spawn_fetch(&self, hash: String, entry: &mut Entry, query_fn: QueryFn) -> watch::Receiver<Outcome> {
        let (tx, rx) = watch::channel(None);
        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        entry.in_flight = Some(InFlight {
            id,
            rx: rx.clone(),
            invalidated: false,
        });

        let client = self.clone();
        tokio::spawn(async move {
            let (outcome, failures) = client.run_with_retry(&hash, query_fn).await;
            client.settle(&hash, id, &outcome, failures);
            // Receivers may all be gone; the cache is already populated.
            let _ = tx.send(Some(outcome));
        });
        rx
    }

    async fn run_with_retry(&self, hash: &str, query_fn: QueryFn) -> (Result<Value, QueryError>, u32) {
        let config = &self.inner.config;
        let mut failures = 0;
        loop {
            match query_fn().await {
                Ok(data) => return (Ok(data), failures),
                Err(e) => {
                    failures += 1;
                    if failures > config.retry {
                        warn!(key = %hash, error = %e, failures, "query failed");
                        return (Err(e), failures);
                    }
                    let delay = config.retry_delay(failures - 1);
                    debug!(key = %hash, error = %e, ?delay, "retrying query");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn settle(&self, hash: &str, id: u64, outcome: &Result<Value, QueryError>, failures: u32) {
        let mut entries = self.entries();
        // The entry may have been removed, or removed and re-created with its own fetch.
        let Some(entry) = entries
            .get_mut(hash)
            .filter(|e| e.in_flight.as_ref().is_some_and(|f| f.id == id))
        else {
            debug!(key = %hash, fetch = id, "discarding result of superseded fetch");
            return;
        };
        let invalidated = entry.in_flight.take().is_some_and(|f| f.invalidated);
        let now = now_ms();
        match outcome {
            Ok(data) => {
                entry.state.succeed(data.clone(), now);
                entry.state.is_invalidated = invalidated;
            }
            Err(e) => entry.state.fail(e.clone(), failures, now),
        }
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.entries()
            .get(&key.hash())
            .and_then(|e| e.state.data.clone())
    }

    pub fn get_query_data_as<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.get_query_data(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set_query_data(&self, key: &QueryKey, data: Value) {
        let mut entries = self.entries();
        let entry = entries
            .entry(key.hash())
            .or_insert_with(|| Entry::new(key.clone()));
        entry.state.succeed(data, now_ms());
        entry.last_access = Instant::now();
    }

    pub fn get_query_state(&self, key: &QueryKey) -> Option<QueryState> {
        self.entries().get(&key.hash()).map(|e| e.state.clone())
    }

    /// Marks every entry under `prefix` stale; the next read refetches.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let mut count = 0;
        for entry in entries.values_mut().filter(|e| e.key.starts_with(prefix)) {
            entry.state.is_invalidated = true;
            if let Some(in_flight) = entry.in_flight.as_mut() {
                in_flight.invalidated = true;
            }
            count += 1;
        }
        count
    }

    pub fn remove_queries(&self, prefix: &QueryKey) {
        self.entries().retain(|_, e| !e.key.starts_with(prefix));
    }

    /// Drops idle entries not read for longer than `gc_time`.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.inner.config.gc_time;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| e.in_flight.is_some() || e.last_access.elapsed() < gc_time);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of pending and successful entries. Errored entries stay behind.
    pub fn dehydrate(&self) -> DehydratedState {
        let entries = self.entries();
        let mut queries: Vec<DehydratedQuery> = entries
            .iter()
            .filter(|(_, e)| should_dehydrate(&e.state))
            .map(|(hash, e)| DehydratedQuery {
                query_key: e.key.clone(),
                query_hash: hash.clone(),
                state: e.state.clone(),
            })
            .collect();
        queries.sort_by(|a, b| a.query_hash.cmp(&b.query_hash));
        DehydratedState { queries }
    }

    /// Merges a snapshot. An existing entry fetched at the same time or later wins.
    pub fn hydrate(&self, snapshot: DehydratedState) {
        let mut entries = self.entries();
        for query in snapshot.queries {
            let hash = query.query_key.hash();
            match entries.get_mut(&hash) {
                Some(existing) if existing.state.data_updated_at >= query.state.data_updated_at => {
                    debug!(key = %hash, "keeping fresher local entry");
                }
                Some(existing) => existing.state = query.state,
                None => {
                    let mut entry = Entry::new(query.query_key);
                    entry.state = query.state;
                    entries.insert(hash, entry);
                }
            }
        }
    }
}

pub fn should_dehydrate(state: &QueryState) -> bool {
    matches!(state.status, QueryStatus::Pending | QueryStatus::Success)
}

async fn wait(mut rx: watch::Receiver<Outcome>) -> Result<Value, QueryError> {
    let outcome: Outcome = match rx.wait_for(Option::is_some).await {
        Ok(settled) => (*settled).clone(),
        Err(_) => return Err(QueryError::internal("query fetch was aborted")),
    };
    outcome.unwrap_or_else(|| Err(QueryError::internal("query settled without a result")))
}
