use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wibeee_nest::{Config, NestProxy, SensorHub, Throttle};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cfg_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.example.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!("loaded config; devices: {}", cfg.devices.len());

    let proxy = NestProxy::start(&cfg.proxy).await?;

    let throttle = Arc::new(Throttle::new(cfg.sensors.throttle()));
    info!(interval = ?throttle.interval(), "sensor throttle configured");

    let (tx, mut updates) = mpsc::unbounded_channel();
    for device in &cfg.devices {
        let mac = device.mac_addr()?;
        let upstream = device.upstream()?;
        info!(mac = %mac, name = %device.display_name(), upstream = %upstream, "registering device");

        let hub = SensorHub::new(mac.clone(), throttle.clone(), tx.clone());
        proxy.register_device(mac, Arc::new(hub), upstream);
    }
    drop(tx);

    let sig = shutdown_signal();
    tokio::pin!(sig);
    loop {
        tokio::select! {
            biased;
            _ = &mut sig => {
                info!("shutdown requested");
                break;
            }
            Some(update) = updates.recv() => {
                info!(
                    mac = %update.mac,
                    sensor = update.kind.name(),
                    phase = %update.phase,
                    value = %update.value,
                    unit = update.kind.unit().unwrap_or(""),
                    "sensor update"
                );
            }
        }
    }

    // devices stay registered until the listener stops; the registry goes with the proxy
    if let Err(e) = proxy.shutdown().await {
        error!(error = %e, "proxy did not shut down cleanly");
    }

    info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
