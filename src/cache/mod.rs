//! Query cache shared between server rendering and the consuming client.
//!
//! Entries are keyed by [`QueryKey`], considered fresh for
//! [`QueryClientConfig::stale_time`], and transferred between processes as a
//! [`DehydratedState`].

mod client;
mod hydration;
mod key;
mod state;

pub use client::{
    should_dehydrate, QueryClient, QueryClientConfig, QueryFn, QueryOptions, DEFAULT_GC_TIME,
    DEFAULT_STALE_TIME,
};
pub use hydration::{DehydratedQuery, DehydratedState, STATE_ELEMENT_ID};
pub use key::QueryKey;
pub use state::{QueryError, QueryState, QueryStatus};

pub(crate) use key::is_empty_input;
