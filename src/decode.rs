use crate::device::MacAddr;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::Uri;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Push values keyed by the meter's short names (`mac`, `v1`, `a2`, ...).
pub type Readings = BTreeMap<String, String>;

/// How a route's payload is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    Query,
    JsonBody,
}

/// Result of decoding one push request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRequest {
    pub mac: Option<MacAddr>,
    pub readings: Readings,
    /// Body to send upstream: the original bytes, or the repaired JSON text.
    pub body: Bytes,
}

impl DecodedRequest {
    fn undecodable(body: Bytes) -> Self {
        Self {
            mac: None,
            readings: Readings::new(),
            body,
        }
    }

    fn from_readings(readings: Readings, body: Bytes) -> Self {
        let mac = readings.get("mac").and_then(|m| MacAddr::parse(m).ok());
        Self {
            mac,
            readings,
            body,
        }
    }
}

pub fn decode(decoding: Decoding, uri: &Uri, body: Bytes) -> DecodedRequest {
    match decoding {
        Decoding::Query => decode_query(uri, body),
        Decoding::JsonBody => decode_json_body(body),
    }
}

/// Readings come from the query string; any body is kept verbatim for forwarding.
pub fn decode_query(uri: &Uri, body: Bytes) -> DecodedRequest {
    match Query::<Vec<(String, String)>>::try_from_uri(uri) {
        Ok(Query(pairs)) => DecodedRequest::from_readings(pairs.into_iter().collect(), body),
        Err(e) => {
            debug!(uri = %uri, error = %e, "unparseable query string");
            DecodedRequest::undecodable(body)
        }
    }
}

/// Readings come from a flat JSON object. Meters emit broken JSON under load, so a
/// failed parse gets one repair attempt (`,,` -> `,` then `""` -> `","`).
pub fn decode_json_body(body: Bytes) -> DecodedRequest {
    if body.is_empty() {
        return DecodedRequest::undecodable(body);
    }

    let text = String::from_utf8_lossy(&body);
    let err = match parse_object(&text) {
        Ok(readings) => return DecodedRequest::from_readings(readings, body),
        Err(e) => e,
    };

    // repair the raw bytes; invalid UTF-8 must reach the upstream unchanged
    let repaired = repair_json(&body);
    if repaired[..] != body[..] {
        match parse_object(&String::from_utf8_lossy(&repaired)) {
            Ok(readings) => {
                debug!(error = %err, body = %text, "repaired invalid JSON push body");
                return DecodedRequest::from_readings(readings, Bytes::from(repaired));
            }
            Err(retry_err) => {
                debug!(error = %err, retry_error = %retry_err, body = %text, "invalid JSON push body");
            }
        }
    } else {
        debug!(error = %err, body = %text, "invalid JSON push body");
    }

    DecodedRequest::undecodable(body)
}

/// The single repair rule for meter JSON. Not a general fixer.
pub fn repair_json(body: &[u8]) -> Vec<u8> {
    let once = replace_bytes(body, b",,", b",");
    replace_bytes(&once, b"\"\"", b"\",\"")
}

/// Non-overlapping, left-to-right replacement, like `str::replace` on bytes.
fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len() + to.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

fn parse_object(text: &str) -> Result<Readings, serde_json::Error> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(obj) => Ok(obj
            .into_iter()
            .map(|(k, v)| (k, stringify_json(&v)))
            .collect()),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn stringify_json(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
