use crate::error::{AppError, Result};
use std::fmt;

/// Wibeee cloud collector used by factory-configured meters.
pub const DEFAULT_UPSTREAM: &str = "http://nest-ingest.wibeee.com";

/// Known collectors a meter can be pointed at.
pub const KNOWN_UPSTREAMS: [&str; 2] = [DEFAULT_UPSTREAM, "http://wdata.solarprofit.es:8080"];

const MASKED: &str = "*MASKED*";

/// Canonical hardware address of a meter: 12 lowercase hex digits, no separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(String);

impl MacAddr {
    /// Accepts `00:11:22:aa:bb:cc`, `00-11-22-AA-BB-CC`, `001122aabbcc` and similar.
    pub fn parse(raw: &str) -> Result<Self> {
        let canonical: String = raw
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if canonical.len() != 12 || !canonical.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::InvalidMac(raw.to_string()));
        }

        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last six hex digits, uppercased, for display.
    pub fn short(&self) -> String {
        self.0[6..].to_ascii_uppercase()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a device's push requests go after local delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// Do not forward; answer the meter with the route's acknowledgement.
    Local,
    /// Forward to this base URL (no trailing slash).
    Remote(String),
}

impl Upstream {
    /// `None`, empty, `local` and `null` all mean local-only.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Upstream::Local),
            Some(s) if s.eq_ignore_ascii_case("local") || s.eq_ignore_ascii_case("null") => {
                return Ok(Upstream::Local)
            }
            Some(s) => s,
        };

        let url =
            reqwest::Url::parse(raw).map_err(|_| AppError::InvalidUpstream(raw.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AppError::InvalidUpstream(raw.to_string()));
        }

        Ok(Upstream::Remote(raw.trim_end_matches('/').to_string()))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Upstream::Local)
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Local => f.write_str("local"),
            Upstream::Remote(url) => f.write_str(url),
        }
    }
}

/// Copy of `values` with the given top-level keys masked.
pub fn scrub_top_level<'a, I>(keys: I, values: &crate::decode::Readings) -> crate::decode::Readings
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scrubbed = values.clone();
    for key in keys {
        if let Some(v) = scrubbed.get_mut(key) {
            *v = MASKED.to_string();
        }
    }
    scrubbed
}
