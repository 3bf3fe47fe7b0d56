// ── Outbound publishing ──
//
// Every outbound message goes through `Publisher`, which owns topic
// construction. Status reports are latest-value and go through a `watch`
// channel on `StatusBoard`.

use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::model::{
    DeviceHandle, DeviceId, EventName, LocationId, OutboundMessage, Snapshot, StatusReport, Topic,
};

/// Destination for outbound messages, provided by the host.
pub trait MessageSink: Send + Sync {
    fn send(&self, message: OutboundMessage);
}

impl MessageSink for mpsc::UnboundedSender<OutboundMessage> {
    fn send(&self, message: OutboundMessage) {
        if mpsc::UnboundedSender::send(self, message).is_err() {
            debug!("message sink closed -- dropping outbound message");
        }
    }
}

/// Builds topics and hands messages to the sink.
pub struct Publisher {
    namespace: String,
    sink: std::sync::Arc<dyn MessageSink>,
}

impl Publisher {
    pub fn new(namespace: impl Into<String>, sink: std::sync::Arc<dyn MessageSink>) -> Self {
        Self {
            namespace: namespace.into(),
            sink,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Topic for `event` on `device`.
    pub fn event_topic(&self, device: &DeviceHandle, event: EventName) -> Topic {
        Topic::device_event(
            &self.namespace,
            device.location_id(),
            device.kind(),
            device.id(),
            event,
        )
    }

    /// Publish `event` carrying `snapshot`.
    ///
    /// Callers pass the snapshot they applied rather than re-reading the
    /// device, which another task may have updated since.
    pub fn publish_event(
        &self,
        device: &DeviceHandle,
        event: EventName,
        snapshot: &Snapshot,
        message: &str,
    ) {
        let topic = self.event_topic(device, event);
        self.send(OutboundMessage::new(topic, snapshot.clone(), message));
    }

    /// Publish `snapshot` on the device's `state` topic.
    pub fn publish_state(&self, device: &DeviceHandle, snapshot: &Snapshot) {
        let message = format!("{} state updated", device.label());
        self.publish_event(device, EventName::State, snapshot, &message);
    }

    /// Publish a directory-level update for any device.
    pub fn announce(&self, location_id: &LocationId, device_id: &DeviceId, snapshot: Snapshot) {
        let topic = Topic::device(&self.namespace, location_id, device_id);
        self.send(OutboundMessage::new(topic, snapshot, "Device listed"));
    }

    fn send(&self, message: OutboundMessage) {
        trace!(topic = %message.topic, "publishing");
        self.sink.send(message);
    }
}

/// Latest status of the owning context.
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<Option<StatusReport>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn report(&self, report: StatusReport) {
        debug!(fill = %report.fill, text = %report.text, "status");
        self.tx.send_replace(Some(report));
    }

    pub fn current(&self) -> Option<StatusReport> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusReport>> {
        self.tx.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
