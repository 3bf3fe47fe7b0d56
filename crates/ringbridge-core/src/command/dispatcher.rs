// ── Command dispatch ──
//
// Forwards unlock requests to the vendor client obtained from the ready
// latch. At most one unlock is in flight per device; a second request for
// the same device is rejected until the first completes. An unlock that
// completes after the context closed is discarded.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Command;
use crate::error::CoreError;
use crate::latch::LatchListener;
use crate::model::status::{STATUS_DOOR_UNLOCKED, STATUS_UNLOCK_FAILED};
use crate::model::{Capability, CommandReply, DeviceHandle, DeviceId, InboundMessage, Snapshot, StatusReport};
use crate::publish::{Publisher, StatusBoard};
use crate::session::Ready;
use crate::store::DeviceRegistry;

/// Executes inbound commands against routed devices.
///
/// Cheaply cloneable via `Arc<DispatcherInner>`.
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: Arc<DeviceRegistry>,
    publisher: Arc<Publisher>,
    status: Arc<StatusBoard>,
    ready: LatchListener<Ready>,
    in_flight: DashMap<DeviceId, ()>,
    closed: CancellationToken,
}

/// Marks a device busy for the lifetime of one unlock.
struct InFlight<'a> {
    map: &'a DashMap<DeviceId, ()>,
    device_id: DeviceId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.device_id);
    }
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        publisher: Arc<Publisher>,
        status: Arc<StatusBoard>,
        ready: LatchListener<Ready>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                publisher,
                status,
                ready,
                in_flight: DashMap::new(),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Handle an inbound message.
    ///
    /// Returns `Ok(None)` for messages that carry no recognized command.
    pub async fn dispatch(
        &self,
        message: &InboundMessage,
    ) -> Result<Option<CommandReply>, CoreError> {
        let Some(command) = Command::parse(message) else {
            debug!(payload = %message.payload, "ignoring inbound message");
            return Ok(None);
        };
        self.execute(command).await.map(Some)
    }

    /// Execute a parsed command.
    pub async fn execute(&self, command: Command) -> Result<CommandReply, CoreError> {
        match command {
            Command::Unlock {
                device_id: Some(device_id),
            } => self.handle_unlock(&device_id).await,
            Command::Unlock { device_id: None } => self.unlock_all().await,
        }
    }

    /// Unlock one device.
    ///
    /// On success the device state is replaced with the returned snapshot
    /// (if any), its `state` message is republished, and a green status is
    /// reported. Every failure, including a rejection before the vendor is
    /// called, reports a red status and leaves state untouched. Nothing is
    /// reported once the context has closed.
    pub async fn handle_unlock(&self, device_id: &DeviceId) -> Result<CommandReply, CoreError> {
        let result = self.unlock(device_id).await;
        match &result {
            Ok(_) => {
                self.inner.status.report(StatusReport::green(STATUS_DOOR_UNLOCKED));
                info!(%device_id, "door unlocked");
            }
            Err(CoreError::ContextClosed) => {}
            Err(e) => {
                warn!(%device_id, error = %e, "unlock failed");
                self.inner.status.report(StatusReport::red(STATUS_UNLOCK_FAILED));
            }
        }
        result
    }

    /// Stop accepting commands. In-flight unlocks complete but are not applied.
    pub fn close(&self) {
        if !self.inner.closed.is_cancelled() {
            self.inner.closed.cancel();
            debug!("command dispatcher closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Whether an unlock is currently in flight for `device_id`.
    pub fn is_in_flight(&self, device_id: &DeviceId) -> bool {
        self.inner.in_flight.contains_key(device_id)
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Unlock every unlock-capable device concurrently. The first failure,
    /// in device id order, is returned.
    async fn unlock_all(&self) -> Result<CommandReply, CoreError> {
        let targets = self.inner.registry.with_capability(Capability::Unlock);
        if targets.is_empty() {
            warn!("unlock requested but no device supports it");
            self.inner.status.report(StatusReport::red(STATUS_UNLOCK_FAILED));
            return Err(CoreError::DeviceNotFound {
                identifier: "any unlock-capable device".into(),
            });
        }
        let results = join_all(targets.iter().map(|d| self.handle_unlock(d.id()))).await;
        results
            .into_iter()
            .reduce(|acc, next| acc.and(next))
            .unwrap_or_else(|| Ok(CommandReply::new(STATUS_DOOR_UNLOCKED)))
    }

    async fn unlock(&self, device_id: &DeviceId) -> Result<CommandReply, CoreError> {
        if self.inner.closed.is_cancelled() {
            return Err(CoreError::ContextClosed);
        }
        let ready = self.inner.ready.get().ok_or(CoreError::NotReady)?;
        let device = self.unlockable(device_id)?;
        let _in_flight = self.claim(device_id)?;

        debug!(%device_id, "unlock requested");
        let result = ready.client().unlock(device_id.as_str()).await;

        if self.inner.closed.is_cancelled() {
            debug!(%device_id, "context closed during unlock -- discarding result");
            return Err(CoreError::ContextClosed);
        }

        let data = result.map_err(|e| CoreError::command(device_id.as_str(), &e))?;
        let returned = Snapshot::new(data);
        let snapshot = if returned.is_well_formed() {
            device.replace_state(returned.clone());
            returned
        } else {
            device.latest_state()
        };
        self.inner.publisher.publish_state(&device, &snapshot);
        Ok(CommandReply::new(STATUS_DOOR_UNLOCKED))
    }

    fn unlockable(&self, device_id: &DeviceId) -> Result<Arc<DeviceHandle>, CoreError> {
        let device = self
            .inner
            .registry
            .get(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.to_string(),
            })?;
        if !device.capabilities().contains(Capability::Unlock) {
            return Err(CoreError::Unsupported {
                device_id: device_id.to_string(),
                operation: "unlock".into(),
            });
        }
        Ok(device)
    }

    fn claim(&self, device_id: &DeviceId) -> Result<InFlight<'_>, CoreError> {
        match self.inner.in_flight.entry(device_id.clone()) {
            Entry::Occupied(_) => Err(CoreError::CommandInFlight {
                device_id: device_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlight {
                    map: &self.inner.in_flight,
                    device_id: device_id.clone(),
                })
            }
        }
    }
}
