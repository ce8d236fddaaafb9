use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::{
    context::Context,
    envelope::{CallEnvelope, ResponseEnvelope},
    router::ProcedureKind,
};
use crate::{error::AppError, state::AppState};

pub const TRPC_PREFIX: &str = "/api/trpc";

#[derive(Debug, Default, Deserialize)]
pub struct BridgeParams {
    pub batch: Option<String>,
    pub input: Option<String>,
}

/// Batch elements that fail to parse keep their slot and answer with an error.
#[derive(Debug)]
struct ParsedRequest {
    calls: Vec<Result<CallEnvelope, AppError>>,
    batched: bool,
}

/// GET and POST share one handler per path shape.
pub fn trpc_routes() -> Router<AppState> {
    Router::new()
        .route(TRPC_PREFIX, get(handle_root).post(handle_root))
        .route("/api/trpc/", get(handle_root).post(handle_root))
        .route("/api/trpc/:procedures", get(handle_path).post(handle_path))
}

#[instrument(skip_all, fields(%method))]
async fn handle_root(
    State(state): State<AppState>,
    ctx: Context,
    method: Method,
    body: Bytes,
) -> Response {
    match parse_root(&method, &body) {
        Ok(parsed) => dispatch(&state, &ctx, &method, parsed).await,
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all, fields(%method, %procedures))]
async fn handle_path(
    State(state): State<AppState>,
    ctx: Context,
    method: Method,
    Path(procedures): Path<String>,
    Query(params): Query<BridgeParams>,
    body: Bytes,
) -> Response {
    match parse_path(&method, &procedures, &params, &body) {
        Ok(parsed) => dispatch(&state, &ctx, &method, parsed).await,
        Err(e) => e.into_response(),
    }
}

fn parse_json(raw: &[u8]) -> Result<Value, AppError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw).map_err(|e| AppError::Validation(format!("malformed input: {e}")))
}

fn parse_path(
    method: &Method,
    procedures: &str,
    params: &BridgeParams,
    body: &[u8],
) -> Result<ParsedRequest, AppError> {
    let names: Vec<&str> = procedures.split(',').map(str::trim).collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(AppError::Validation("missing procedure name".into()));
    }

    let raw = if *method == Method::GET {
        parse_json(params.input.as_deref().unwrap_or_default().as_bytes())?
    } else {
        parse_json(body)?
    };

    let batched = params.batch.as_deref() == Some("1") || names.len() > 1;
    if !batched {
        let procedure = names[0].to_string();
        return Ok(ParsedRequest {
            calls: vec![Ok(CallEnvelope { procedure, input: raw })],
            batched,
        });
    }

    let inputs = match raw {
        Value::Null => Default::default(),
        Value::Object(map) => map,
        _ => {
            return Err(AppError::Validation(
                "batched input must be an object keyed by call index".into(),
            ))
        }
    };
    let calls = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Ok(CallEnvelope {
                procedure: name.to_string(),
                input: inputs.get(&i.to_string()).cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    Ok(ParsedRequest { calls, batched })
}

fn parse_call(raw: Value) -> Result<CallEnvelope, AppError> {
    serde_json::from_value(raw).map_err(|e| AppError::Validation(format!("malformed call: {e}")))
}

fn parse_root(method: &Method, body: &[u8]) -> Result<ParsedRequest, AppError> {
    if *method == Method::GET {
        return Err(AppError::Validation("missing procedure name".into()));
    }
    match parse_json(body)? {
        Value::Array(items) => Ok(ParsedRequest {
            calls: items.into_iter().map(parse_call).collect(),
            batched: true,
        }),
        Value::Null => Err(AppError::Validation("missing procedure name".into())),
        single => Ok(ParsedRequest {
            calls: vec![Ok(parse_call(single)?)],
            batched: false,
        }),
    }
}

async fn run_call(
    state: &AppState,
    ctx: &Context,
    method: &Method,
    call: Result<CallEnvelope, AppError>,
) -> Result<Value, AppError> {
    let call = call?;
    let procedure = state.registry.get(&call.procedure)?;
    if *method == Method::GET && procedure.kind() == ProcedureKind::Mutation {
        return Err(AppError::MethodNotSupported {
            procedure: call.procedure,
            method: method.to_string(),
        });
    }
    state.registry.invoke(ctx, &call.procedure, call.input).await
}

/// Calls in one request run concurrently and report independently.
async fn dispatch(state: &AppState, ctx: &Context, method: &Method, parsed: ParsedRequest) -> Response {
    info!(calls = parsed.calls.len(), batched = parsed.batched, caller = %ctx.caller_id, "rpc request");
    let results = join_all(
        parsed
            .calls
            .into_iter()
            .map(|call| run_call(state, ctx, method, call)),
    )
    .await;

    if !parsed.batched {
        let Some(result) = results.into_iter().next() else {
            return AppError::Validation("missing procedure name".into()).into_response();
        };
        let status = match &result {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        };
        return (status, Json(ResponseEnvelope::from(result))).into_response();
    }

    let envelopes: Vec<ResponseEnvelope> = results.into_iter().map(ResponseEnvelope::from).collect();
    let status = if envelopes.iter().any(ResponseEnvelope::is_error) {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    (status, Json(envelopes)).into_response()
}
