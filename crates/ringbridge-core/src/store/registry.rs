// ── Device registry ──
//
// Concurrent map of routed devices with push-based change notification
// of the device list. Per-device state lives on the handle itself.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{Capability, DeviceHandle, DeviceId};

/// Devices the bridge currently routes, keyed by id.
pub struct DeviceRegistry {
    by_id: DashMap<DeviceId, Arc<DeviceHandle>>,
    /// Sorted device list, rebuilt on mutation for subscribers.
    snapshot: watch::Sender<Arc<Vec<Arc<DeviceHandle>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            snapshot,
        }
    }

    /// Replace the registry contents with `devices`.
    pub(crate) fn replace_all(&self, devices: impl IntoIterator<Item = Arc<DeviceHandle>>) {
        self.by_id.clear();
        for device in devices {
            self.by_id.insert(device.id().clone(), device);
        }
        self.rebuild_snapshot();
    }

    pub fn get(&self, id: &DeviceId) -> Option<Arc<DeviceHandle>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// All devices, ordered by id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceHandle>>> {
        self.snapshot.borrow().clone()
    }

    /// Devices exposing `capability`, ordered by id.
    pub fn with_capability(&self, capability: Capability) -> Vec<Arc<DeviceHandle>> {
        self.snapshot()
            .iter()
            .filter(|d| d.capabilities().contains(capability))
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<DeviceHandle>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<DeviceHandle>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id().cmp(b.id()));
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
