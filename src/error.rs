use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Upstream HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid upstream '{0}'")]
    InvalidUpstream(String),

    #[error("Invalid MAC address '{0}'")]
    InvalidMac(String),

    #[error("Refusing to bind to non-local address {0}")]
    BindAddress(std::net::IpAddr),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
