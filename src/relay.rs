//! Push request handling: decode, deliver to the device's listener, then either
//! acknowledge locally or relay the request to the device's upstream collector.

use crate::decode::decode;
use crate::device::{scrub_top_level, Upstream};
use crate::forward::Forwarder;
use crate::registry::DeviceRegistry;
use crate::route::Route;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn, Level};

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

const LOG_SCRUBBED_KEYS: [&str; 1] = ["ip"];

#[derive(Debug, Clone)]
pub struct RelayState {
    pub registry: DeviceRegistry,
    pub forwarder: Forwarder,
    /// Once cancelled, no new upstream request is started.
    pub shutdown: CancellationToken,
    pub max_body_bytes: usize,
}

impl RelayState {
    pub fn new(registry: DeviceRegistry, forwarder: Forwarder, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            forwarder,
            shutdown,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn create_router(state: RelayState) -> Router {
    let mut router = Router::new();

    for route in Route::ALL {
        let handler = move |State(state): State<RelayState>, request: Request| async move {
            handle_push(state, route, request).await
        };
        let method_router = if route.method() == Method::POST {
            post(handler)
        } else {
            get(handler)
        };
        // a known path with the wrong method is absorbed like any unknown request
        router = router.route(route.path(), method_router.fallback(unknown_path));
    }

    router
        .fallback(unknown_path)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::DEBUG,
                        "push_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                })
                .on_response(
                    |response: &Response, latency: std::time::Duration, _span: &tracing::Span| {
                        tracing::event!(
                            Level::DEBUG,
                            status = response.status().as_u16(),
                            latency = ?latency,
                            "request completed"
                        );
                    },
                )
                .on_failure(
                    |_error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::DEBUG, "request answered with server error");
                    },
                ),
        )
        .with_state(state)
}

async fn handle_push(state: RelayState, route: Route, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body: Bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            warn!(path = route.path(), error = %e, "failed to read push request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let decoded = decode(route.decoding(), &parts.uri, body);
    let readings = scrub_top_level(LOG_SCRUBBED_KEYS, &decoded.readings);

    let device = match decoded.mac.as_ref() {
        Some(mac) => state.registry.lookup(mac).map(|d| (mac, d)),
        None => None,
    };
    let Some((mac, device)) = device else {
        debug!(
            mac = ?decoded.mac,
            method = %parts.method,
            path = route.path(),
            readings = ?readings,
            "ignoring push data from unexpected device"
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    debug!(mac = %mac, method = %parts.method, path = route.path(), readings = ?readings, "updating sensors from push data");
    device.listener.deliver(&decoded.readings);

    let base = match &device.upstream {
        Upstream::Local => {
            debug!(mac = %mac, path = route.path(), "accepted local-only push data");
            return (StatusCode::OK, route.ack_body(Utc::now())).into_response();
        }
        Upstream::Remote(base) => base,
    };

    if state.shutdown.is_cancelled() {
        debug!(mac = %mac, upstream = %base, "shutting down; not forwarding push data");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| route.path());
    let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();

    match state
        .forwarder
        .forward(base, path_and_query, parts.method.clone(), content_type, decoded.body)
        .await
    {
        Ok(upstream) => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = upstream.headers;
            response
        }
        Err(e) => {
            error!(
                mac = %mac,
                upstream = %base,
                method = %parts.method,
                path = route.path(),
                error = %e,
                "upstream HTTP error while forwarding push data"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn unknown_path(method: Method, uri: Uri) -> StatusCode {
    debug!(method = %method, path = %uri.path(), "ignoring unexpected request");
    StatusCode::OK
}
