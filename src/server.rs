use crate::config::ProxyConfig;
use crate::device::{MacAddr, Upstream};
use crate::error::{AppError, Result};
use crate::forward::Forwarder;
use crate::listener::PushListener;
use crate::net;
use crate::registry::DeviceRegistry;
use crate::relay::{create_router, RelayState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Running Nest proxy. Create one per process and pass it to whatever registers devices.
pub struct NestProxy {
    registry: DeviceRegistry,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
}

impl NestProxy {
    /// Binds to `cfg.host`, or to the address of the interface facing the
    /// internet when unset. Only local addresses are accepted.
    pub async fn start(cfg: &ProxyConfig) -> Result<Self> {
        let ip = match cfg.host {
            Some(ip) => ip,
            None => net::source_ip(net::PUBLIC_TARGET_IP).await?,
        };
        let ip = net::ensure_local(ip)?;

        let listener = TcpListener::bind(SocketAddr::new(ip, cfg.port)).await?;
        Self::serve(listener, cfg).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(listener: TcpListener, cfg: &ProxyConfig) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let registry = DeviceRegistry::new();
        let shutdown = CancellationToken::new();

        let state = RelayState::new(
            registry.clone(),
            Forwarder::new(cfg.upstream_timeout())?,
            shutdown.clone(),
        )
        .with_max_body_bytes(cfg.max_body_bytes);
        let app = create_router(state);

        let stop = shutdown.clone().cancelled_owned();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stop)
                .await
        });

        info!("Wibeee Nest proxy listening on http://{}", local_addr);
        Ok(Self {
            registry,
            local_addr,
            shutdown,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn register_device(&self, mac: MacAddr, listener: Arc<dyn PushListener>, upstream: Upstream) {
        self.registry.register(mac, listener, upstream);
    }

    pub fn unregister_device(&self, mac: &MacAddr) {
        self.registry.unregister(mac);
    }

    /// Token cancelled when the proxy starts shutting down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops accepting connections, lets in-flight requests finish, and waits
    /// for the listener task.
    pub async fn shutdown(self) -> Result<()> {
        info!("Wibeee Nest proxy shutting down");
        self.shutdown.cancel();
        match self.server.await {
            Ok(res) => res.map_err(AppError::Io),
            Err(e) => Err(AppError::Other(anyhow::anyhow!("proxy task failed: {}", e))),
        }
    }
}
