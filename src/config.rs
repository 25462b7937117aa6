use crate::device::{MacAddr, Upstream};
use crate::error::{AppError, Result};
use crate::relay::DEFAULT_MAX_BODY_BYTES;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address to listen on; resolved from the default route when absent.
    #[serde(default)]
    pub host: Option<IpAddr>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8600
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ProxyConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Minimum seconds between updates of one sensor; 0 disables throttling.
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,
}

fn default_throttle_secs() -> u64 {
    5
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            throttle_secs: default_throttle_secs(),
        }
    }
}

impl SensorConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Collector base URL; absent, `null` or `local` answers the meter locally.
    #[serde(default)]
    pub upstream: Option<String>,
}

impl DeviceEntry {
    pub fn mac_addr(&self) -> Result<MacAddr> {
        MacAddr::parse(&self.mac)
    }

    pub fn upstream(&self) -> Result<Upstream> {
        Upstream::parse(self.upstream.as_deref())
    }

    pub fn display_name(&self) -> String {
        match (&self.name, self.mac_addr()) {
            (Some(name), _) => name.clone(),
            (None, Ok(mac)) => format!("Wibeee {}", mac.short()),
            (None, Err(_)) => self.mac.clone(),
        }
    }
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// If NEST_PROXY_PORT is set it overrides `proxy.port`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_yaml(&raw)?;

        if let Ok(port) = std::env::var("NEST_PROXY_PORT") {
            cfg.proxy.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("NEST_PROXY_PORT is not a port: {}", port)))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let expanded = expand_env_placeholders(raw)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.proxy.port == 0 {
            return Err(AppError::Config("proxy port cannot be 0".to_string()));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            let mac = device.mac_addr()?;
            device.upstream()?;
            if !seen.insert(mac.clone()) {
                return Err(AppError::Config(format!("device {} configured twice", mac)));
            }
        }

        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" is a literal "$"; a "$" not followed by "(" or "{" is kept as-is.
fn expand_env_placeholders(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();

        let mut var = String::new();
        loop {
            match it.next() {
                Some(ch) if ch == close => break,
                Some(ch) => var.push(ch),
                None => {
                    return Err(AppError::Config(format!(
                        "unterminated env placeholder: missing '{}'",
                        close
                    )))
                }
            }
        }

        let val = std::env::var(&var)
            .map_err(|_| AppError::Config(format!("missing environment variable: {}", var)))?;
        out.push_str(&val);
    }

    Ok(out)
}
