//! Axum router and all HTTP handlers for rctl-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use rctl_schemas::{Kind, Object, ResourceKey};
use rctl_store::{Applied, StoreError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{ApplyResponse, ErrorResponse, HealthResponse, ListQuery, ResourceList},
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/resources", get(list_resources).post(apply_resource))
        .route("/v1/resources/:namespace/:kind/:name", get(get_resource))
        .with_state(state)
}

fn error(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(code, msg))).into_response()
}

fn store_error(e: StoreError) -> Response {
    match &e {
        StoreError::NotFound { .. } => error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
        StoreError::SpecImmutable { .. } => {
            error(StatusCode::CONFLICT, "spec_immutable", e.to_string())
        }
        StoreError::Conflict { .. } => error(StatusCode::CONFLICT, "conflict", e.to_string()),
        StoreError::Backend { .. } => {
            error(StatusCode::INTERNAL_SERVER_ERROR, "store", e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> Response {
    match st.snapshot() {
        Ok(snap) => {
            let _ = st.bus.send(BusMsg::Status(snap.clone()));
            (StatusCode::OK, Json(snap)).into_response()
        }
        Err(e) => store_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/resources
// ---------------------------------------------------------------------------

pub(crate) async fn list_resources(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Response {
    let kind = match q.kind.as_deref().map(str::parse::<Kind>).transpose() {
        Ok(k) => k,
        Err(e) => return error(StatusCode::BAD_REQUEST, "bad_request", e.to_string()),
    };
    match st.store.list(q.namespace.as_deref(), kind) {
        Ok(items) => (StatusCode::OK, Json(ResourceList { items })).into_response(),
        Err(e) => store_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/resources/:namespace/:kind/:name
// ---------------------------------------------------------------------------

pub(crate) async fn get_resource(
    State(st): State<Arc<AppState>>,
    Path((namespace, kind, name)): Path<(String, String, String)>,
) -> Response {
    let kind: Kind = match kind.parse() {
        Ok(k) => k,
        Err(e) => return error(StatusCode::BAD_REQUEST, "bad_request", format!("{e}")),
    };
    match st.store.get(&ResourceKey::new(namespace, name, kind)) {
        Ok(obj) => (StatusCode::OK, Json(obj)).into_response(),
        Err(e) => store_error(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/resources
// ---------------------------------------------------------------------------

/// Apply one manifest object. Status in the body is ignored on create.
///
/// `201` when created, `200` when an identical object already exists,
/// `409` when the stored object has a different spec.
pub(crate) async fn apply_resource(
    State(st): State<Arc<AppState>>,
    Json(mut obj): Json<Object>,
) -> Response {
    obj.clear_status();
    match st.store.apply(obj) {
        Ok(Applied::Created(object)) => {
            info!(resource = %object.key(), "resource/apply created");
            (
                StatusCode::CREATED,
                Json(ApplyResponse {
                    result: "created".to_string(),
                    object,
                }),
            )
                .into_response()
        }
        Ok(Applied::Unchanged(object)) => (
            StatusCode::OK,
            Json(ApplyResponse {
                result: "unchanged".to_string(),
                object,
            }),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
