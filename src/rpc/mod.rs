//! Typed procedure layer: registry, per-request context, in-process caller
//! and the HTTP bridge at `/api/trpc`.

pub mod caller;
pub mod context;
pub mod envelope;
pub mod http;
pub mod procedures;
pub mod router;

pub use caller::Caller;
pub use context::{create_context, Context};
pub use procedures::{app_router, GET_USERS};
pub use router::{Procedure, ProcedureKind, Registry};
