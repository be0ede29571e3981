//! Handlers for the proxied runtime API routes.

use std::sync::Arc;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use super::AppState;
use super::envelope;
use crate::error::ExtensionError;

/// Headers that describe a single hop and must not be copied between connections.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "content-length"
            | "host"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copy end-to-end headers from `src` into `dst`.
fn copy_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    for (name, value) in src {
        if !is_hop_by_hop(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}

/// Middleware: log every request the function runtime makes.
pub async fn log_incoming_request(req: Request, next: Next) -> Response {
    info!("{} {}", req.method(), req.uri());
    next.run(req).await
}

/// `GET /invocation/next`: fetch the next event and mark it processed when the
/// fetch succeeded.
pub async fn handle_next(State(state): State<Arc<AppState>>) -> Response {
    info!("handleNext");
    let url = format!("{}/invocation/next", state.runtime_api_url);

    let upstream = match state.client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => return upstream_unavailable(&state, "invocation/next", e),
    };
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let payload = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return upstream_unavailable(&state, "invocation/next", e),
    };

    let payload = if state.mark_processed && status.is_success() {
        envelope::mark_processed(&payload)
            .map(Bytes::from)
            .unwrap_or(payload)
    } else {
        payload
    };

    build_response(status, &headers, payload)
}

/// `POST /invocation/{requestId}/response`: scan, redact, then post upstream.
pub async fn handle_response(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("handleResponse requestid={}", request_id);

    let rewritten = envelope::process_response(
        &state.pipeline,
        &body,
        &state.scan_filename,
        state.mark_processed,
    )
    .await;

    let path = format!("invocation/{}/response", request_id);
    let resp = forward(&state, &path, &headers, Bytes::from(rewritten)).await;
    info!("handleResponse posted");
    resp
}

/// `POST /init/error`: relay verbatim.
pub async fn handle_init_error(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("handleInitError");
    let resp = forward(&state, "init/error", &headers, body).await;
    info!("handleInitError posted");
    resp
}

/// `POST /invocation/{requestId}/error`: relay verbatim.
pub async fn handle_invocation_error(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("handleInvokeError requestid={}", request_id);
    let path = format!("invocation/{}/error", request_id);
    let resp = forward(&state, &path, &headers, body).await;
    info!("handleInvokeError posted");
    resp
}

/// POST `body` to the runtime API at `path` and relay the reply.
async fn forward(state: &AppState, path: &str, headers: &HeaderMap, body: Bytes) -> Response {
    let url = format!("{}/{}", state.runtime_api_url, path);
    let mut outgoing = HeaderMap::new();
    copy_headers(headers, &mut outgoing);

    let upstream = match state
        .client
        .post(&url)
        .headers(outgoing)
        .body(body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return upstream_unavailable(state, path, e),
    };

    let status = upstream.status();
    let headers = upstream.headers().clone();
    match upstream.bytes().await {
        Ok(reply) => build_response(status, &headers, reply),
        Err(e) => upstream_unavailable(state, path, e),
    }
}

fn build_response(status: StatusCode, upstream_headers: &HeaderMap, body: Bytes) -> Response {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    copy_headers(upstream_headers, resp.headers_mut());
    resp
}

/// The real runtime API is gone; the execution environment is not usable.
fn upstream_unavailable(state: &AppState, path: &str, err: reqwest::Error) -> Response {
    let err = ExtensionError::UpstreamUnavailable(format!("{}: {}", path, err));
    error!("{}", err);
    state.fatal.notify_one();
    (
        StatusCode::BAD_GATEWAY,
        Json(serde_json::json!({
            "errorType": "UpstreamUnavailable",
            "errorMessage": err.to_string(),
        })),
    )
        .into_response()
}
