//! Device registry: which meters the proxy accepts and where their data goes.
//!
//! The map is copy-on-write behind an `ArcSwap`. Lookups never take a lock and
//! always see either the previous or the next complete entry.

use crate::device::{MacAddr, Upstream};
use crate::listener::PushListener;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Forwarding configuration for one device. Never mutated once registered.
#[derive(Clone)]
pub struct DeviceConfig {
    pub listener: Arc<dyn PushListener>,
    pub upstream: Upstream,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: Arc<ArcSwap<HashMap<MacAddr, Arc<DeviceConfig>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces the config for `mac`.
    pub fn register(&self, mac: MacAddr, listener: Arc<dyn PushListener>, upstream: Upstream) {
        debug!(mac = %mac, upstream = %upstream, "registering device");
        let entry = Arc::new(DeviceConfig { listener, upstream });
        self.devices.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(mac.clone(), Arc::clone(&entry));
            next
        });
    }

    /// Removes `mac`; unknown devices are ignored.
    pub fn unregister(&self, mac: &MacAddr) {
        if !self.devices.load().contains_key(mac) {
            return;
        }
        debug!(mac = %mac, "unregistering device");
        self.devices.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(mac);
            next
        });
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<Arc<DeviceConfig>> {
        self.devices.load().get(mac).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
