#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use axum_test::TestServer;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wibeee_nest::forward::Forwarder;
use wibeee_nest::{create_router, DeviceRegistry, PushListener, Readings, RelayState};

pub const MAC: &str = "001122334455";

/// Listener that remembers every delivery.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Readings>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Readings> {
        self.calls.lock().unwrap().clone()
    }
}

impl PushListener for Recorder {
    fn deliver(&self, readings: &Readings) {
        self.calls.lock().unwrap().push(readings.clone());
    }
}

pub fn readings(pairs: &[(&str, &str)]) -> Readings {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A push as sent by a WBM meter.
pub fn push_data() -> Readings {
    readings(&[
        ("mac", MAC),
        ("ip", "127.0.0.1"),
        ("soft", "3.3.614"),
        ("model", "WBM"),
        ("time", "1740333343"),
        ("v1", "242.75"),
        ("i1", "3.59"),
        ("p1", "871"),
        ("a1", "610"),
        ("r1", "-615"),
        ("q1", "49.93"),
        ("f1", "0.700"),
        ("e1", "6439820"),
        ("o1", "0"),
    ])
}

pub fn relay_state(registry: &DeviceRegistry) -> RelayState {
    relay_state_with_timeout(registry, Duration::from_secs(2))
}

pub fn relay_state_with_timeout(registry: &DeviceRegistry, timeout: Duration) -> RelayState {
    RelayState::new(
        registry.clone(),
        Forwarder::new(timeout).unwrap(),
        CancellationToken::new(),
    )
}

pub fn relay_server(state: RelayState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

/// What the fake collector saw.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path_and_query: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Starts a collector on a random port answering every request with `status` and `body`.
pub async fn start_upstream(
    status: StatusCode,
    body: &'static str,
) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let app = Router::new().fallback(move |request: Request| {
        let sink = sink.clone();
        async move {
            let (parts, req_body) = request.into_parts();
            let req_body = axum::body::to_bytes(req_body, usize::MAX).await.unwrap();
            sink.lock().unwrap().push(Captured {
                method: parts.method,
                path_and_query: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.to_string())
                    .unwrap_or_default(),
                content_type: parts
                    .headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body: req_body,
            });
            (status, [("x-collector", "fake-wibeee")], body).into_response()
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

/// Starts a collector that waits `delay` before answering 200.
pub async fn start_slow_upstream(delay: Duration) -> String {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        (StatusCode::OK, "<<<WBAVG ")
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Base URL nothing is listening on.
pub fn unreachable_upstream() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
