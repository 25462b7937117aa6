use crate::error::Result;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Upstream reply, relayed to the meter as-is.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Replays meter requests against a collector.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self> {
        // One connection per forwarded request; the collector closes idle ones silently.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Sends `method base+path_and_query` with `body`. Only transport failures
    /// are errors; any HTTP status is a response.
    pub async fn forward(
        &self,
        base: &str,
        path_and_query: &str,
        method: Method,
        content_type: Option<HeaderValue>,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let url = format!("{}{}", base, path_and_query);
        debug!(method = %method, url = %url, "forwarding push request");

        let mut request = self
            .client
            .request(method, &url)
            .header(header::CONNECTION, "close")
            .body(body);
        if let Some(ct) = content_type {
            request = request.header(header::CONTENT_TYPE, ct);
        }

        let res = request.send().await?;
        let status = res.status();
        let headers = relayable_headers(res.headers());
        let body = res.bytes().await?;

        if !status.is_success() {
            warn!(
                upstream = %base,
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&body),
                "upstream rejected forwarded request"
            );
        } else {
            debug!(upstream = %base, status = status.as_u16(), "upstream accepted forwarded request");
        }

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Drops connection-scoped headers; the server recomputes framing for the relayed body.
fn relayable_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::CONTENT_LENGTH,
        header::HeaderName::from_static("keep-alive"),
    ] {
        headers.remove(name);
    }
    headers
}
