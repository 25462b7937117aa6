use crate::decode::Readings;
use crate::device::MacAddr;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives decoded push readings for one device.
///
/// Called synchronously on the request path, before any forwarding, so
/// implementations must not block.
pub trait PushListener: Send + Sync {
    fn deliver(&self, readings: &Readings);
}

/// A push as handed to a channel consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct PushData {
    pub mac: MacAddr,
    pub readings: Readings,
}

/// Hands readings to an async consumer over an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    mac: MacAddr,
    tx: mpsc::UnboundedSender<PushData>,
}

impl ChannelListener {
    pub fn new(mac: MacAddr, tx: mpsc::UnboundedSender<PushData>) -> Self {
        Self { mac, tx }
    }
}

impl PushListener for ChannelListener {
    fn deliver(&self, readings: &Readings) {
        let push = PushData {
            mac: self.mac.clone(),
            readings: readings.clone(),
        };
        if self.tx.send(push).is_err() {
            warn!(mac = %self.mac, "push consumer has gone away; dropping readings");
        }
    }
}
