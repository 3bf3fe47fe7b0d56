// ── Device event routing ──
//
// Enumerates the directory once the session is ready, opens one
// subscription per routed device per event family, and republishes every
// event as an outbound message followed by the device's `state` message.
//
// All sources are opened before any handler is spawned: a directory or
// subscribe failure leaves nothing subscribed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream::select_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ringbridge_api::{DeviceEvent, EventStream};

use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::model::{CapabilitySet, DeviceHandle, EventKind, EventName, LocationId, Snapshot};
use crate::publish::Publisher;
use crate::session::Ready;
use crate::store::DeviceRegistry;
use crate::subscription::{Subscription, SubscriptionGuard, SubscriptionSource};
use crate::sync::lock;

/// Routes device push events to the message sink.
///
/// Cheaply cloneable via `Arc<RouterInner>`.
#[derive(Clone)]
pub struct DeviceEventRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    required: CapabilitySet,
    announce_devices: bool,
    registry: Arc<DeviceRegistry>,
    publisher: Arc<Publisher>,
    subscriptions: Mutex<Vec<Subscription>>,
    start_lock: tokio::sync::Mutex<()>,
    started: AtomicBool,
    stopped: CancellationToken,
}

/// A source opened during `start`, not yet handed to a handler.
struct PendingSource {
    device: Arc<DeviceHandle>,
    kind: EventKind,
    stream: EventStream,
}

impl DeviceEventRouter {
    pub fn new(
        config: &BridgeConfig,
        registry: Arc<DeviceRegistry>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                required: config.required_capabilities.clone(),
                announce_devices: config.announce_devices,
                registry,
                publisher,
                subscriptions: Mutex::new(Vec::new()),
                start_lock: tokio::sync::Mutex::new(()),
                started: AtomicBool::new(false),
                stopped: CancellationToken::new(),
            }),
        }
    }

    /// Enumerate devices and open their subscriptions.
    ///
    /// Returns the number of subscriptions opened. Concurrent calls are
    /// serialized; calling again after a successful start is a no-op
    /// returning the current count.
    pub async fn start(&self, ready: &Ready) -> Result<usize, CoreError> {
        let _serialized = self.inner.start_lock.lock().await;

        if self.inner.stopped.is_cancelled() {
            return Err(CoreError::ContextClosed);
        }
        if self.inner.started.load(Ordering::Acquire) {
            return Ok(self.subscription_count());
        }

        let client = ready.client();
        let locations = client.locations().await.map_err(|e| {
            warn!(error = %e, "device directory lookup failed");
            CoreError::directory(&e)
        })?;

        let mut listed: Vec<(LocationId, Arc<DeviceHandle>)> = Vec::new();
        for location in locations {
            let location_id = LocationId::from(location.id);
            for record in location.devices {
                listed.push((location_id.clone(), Arc::new(DeviceHandle::from(record))));
            }
        }

        let routed: Vec<Arc<DeviceHandle>> = listed
            .iter()
            .map(|(_, device)| device)
            .filter(|device| {
                let matches = device.capabilities().covers(&self.inner.required);
                if !matches {
                    debug!(device_id = %device.id(), kind = %device.kind(), "skipping device");
                }
                matches
            })
            .cloned()
            .collect();

        let mut pending = Vec::new();
        for device in &routed {
            for kind in device.event_kinds() {
                let stream = client.subscribe(device.id().as_str(), kind).map_err(|e| {
                    warn!(device_id = %device.id(), %kind, error = %e, "failed to open event source");
                    CoreError::directory(&e)
                })?;
                pending.push(PendingSource {
                    device: Arc::clone(device),
                    kind,
                    stream,
                });
            }
        }

        let opened = self.activate(pending)?;
        self.inner.registry.replace_all(routed.iter().cloned());
        self.inner.started.store(true, Ordering::Release);

        if self.inner.announce_devices {
            for (location_id, device) in &listed {
                self.inner
                    .publisher
                    .announce(location_id, device.id(), device.latest_state());
            }
        }

        info!(
            devices = routed.len(),
            skipped = listed.len() - routed.len(),
            subscriptions = opened,
            "device event routing started"
        );
        Ok(opened)
    }

    /// Deactivate every subscription. Returns how many this call deactivated.
    pub fn stop(&self) -> usize {
        self.inner.stopped.cancel();
        let subscriptions = lock(&self.inner.subscriptions);
        let deactivated = subscriptions.iter().filter(|s| s.deactivate()).count();
        if deactivated > 0 {
            info!(deactivated, "device event routing stopped");
        }
        deactivated
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.inner.subscriptions).len()
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.inner.subscriptions)
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    pub fn sources(&self) -> Vec<SubscriptionSource> {
        lock(&self.inner.subscriptions)
            .iter()
            .map(|s| s.source().clone())
            .collect()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Turn pending sources into live subscriptions, one handler task per
    /// device so a device's events keep their arrival order.
    ///
    /// Fails without spawning anything if `stop()` has already run.
    fn activate(&self, pending: Vec<PendingSource>) -> Result<usize, CoreError> {
        let mut by_device: Vec<(Arc<DeviceHandle>, Vec<(EventKind, EventStream)>)> = Vec::new();
        for source in pending {
            match by_device
                .iter_mut()
                .find(|(device, _)| Arc::ptr_eq(device, &source.device))
            {
                Some((_, streams)) => streams.push((source.kind, source.stream)),
                None => by_device.push((source.device, vec![(source.kind, source.stream)])),
            }
        }

        // `stop()` cancels before taking this lock, so either it sees the
        // subscriptions pushed below or this check sees the cancellation.
        let mut subscriptions = lock(&self.inner.subscriptions);
        if self.inner.stopped.is_cancelled() {
            debug!("routing stopped while sources were opening -- discarding them");
            return Err(CoreError::ContextClosed);
        }
        let before = subscriptions.len();

        for (device, streams) in by_device {
            let mut tagged = Vec::with_capacity(streams.len());
            for (kind, stream) in streams {
                let subscription = Subscription::new(SubscriptionSource::Device {
                    device_id: device.id().clone(),
                    kind,
                });
                let guard = subscription.guard();
                tagged.push(
                    subscription
                        .bind(stream)
                        .map(move |item| (kind, guard.clone(), item))
                        .boxed(),
                );
                subscriptions.push(subscription);
            }

            let publisher = Arc::clone(&self.inner.publisher);
            tokio::spawn(route_device(device, select_all(tagged), publisher));
        }

        Ok(subscriptions.len() - before)
    }
}

/// Handler task for one device: drains its merged sources until every
/// subscription of the device has been deactivated.
async fn route_device<S>(device: Arc<DeviceHandle>, mut events: S, publisher: Arc<Publisher>)
where
    S: futures_util::Stream<
            Item = (
                EventKind,
                SubscriptionGuard,
                Result<DeviceEvent, ringbridge_api::Error>,
            ),
        > + Unpin,
{
    while let Some((kind, guard, item)) = events.next().await {
        if !guard.is_active() {
            debug!(device_id = %device.id(), %kind, "discarding event after teardown");
            continue;
        }
        match item.map_err(CoreError::from).and_then(|event| check_event(&device, kind, event)) {
            Ok(snapshot) => deliver(&device, kind, snapshot, &publisher),
            Err(e) => warn!(device_id = %device.id(), %kind, error = %e, "dropping event"),
        }
    }
    debug!(device_id = %device.id(), "device event handler exiting");
}

/// Validate an event against the source it arrived on.
fn check_event(
    device: &DeviceHandle,
    expected: EventKind,
    event: DeviceEvent,
) -> Result<Snapshot, CoreError> {
    if event.kind != expected {
        return Err(CoreError::Delivery {
            device_id: device.id().to_string(),
            message: format!("{} event on {expected} source", event.kind),
        });
    }
    let snapshot = Snapshot::new(event.snapshot);
    if !snapshot.is_well_formed() {
        return Err(CoreError::Delivery {
            device_id: device.id().to_string(),
            message: "device data is not an object".into(),
        });
    }
    Ok(snapshot)
}

/// Replace the device state, then publish the event and the derived state.
fn deliver(device: &DeviceHandle, kind: EventKind, snapshot: Snapshot, publisher: &Publisher) {
    device.replace_state(snapshot.clone());

    let name = EventName::for_event(kind);
    match name {
        EventName::State => {}
        EventName::Ding => {
            let message = format!("{} ding received", device.label());
            publisher.publish_event(device, name, &snapshot, &message);
        }
        EventName::Unlock => {
            let message = format!("{} unlocked", device.label());
            publisher.publish_event(device, name, &snapshot, &message);
        }
    }
    publisher.publish_state(device, &snapshot);
}
