// ── Message shapes exchanged with the automation host ──
//
// Outbound:  { "topic": "...", "payload": { "deviceSnapshot": {...}, "message": "..." } }
// Inbound:   { "payload": "unlock", "deviceId": "..." }
// Reply:     { "payload": "Door unlocked" }

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use ringbridge_api::{DeviceKind, EventKind};

use super::device::Snapshot;
use super::ids::{DeviceId, LocationId};

/// Last topic segment of a per-device message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventName {
    Ding,
    Unlock,
    State,
}

impl EventName {
    /// Topic name for a push event. Data updates publish straight to `state`.
    pub fn for_event(kind: EventKind) -> Self {
        match kind {
            EventKind::Ding => Self::Ding,
            EventKind::Unlocked => Self::Unlock,
            EventKind::DataUpdate => Self::State,
        }
    }
}

/// A fully-qualified outbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// `<namespace>/<location>/<kind>/<device>/<event>`
    pub fn device_event(
        namespace: &str,
        location_id: &LocationId,
        kind: DeviceKind,
        device_id: &DeviceId,
        event: EventName,
    ) -> Self {
        Self(format!(
            "{namespace}/{location_id}/{kind}/{device_id}/{event}"
        ))
    }

    /// `<namespace>/<location>/device/<device>`, for directory-level updates.
    pub fn device(namespace: &str, location_id: &LocationId, device_id: &DeviceId) -> Self {
        Self(format!("{namespace}/{location_id}/device/{device_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub device_snapshot: Snapshot,
    pub message: String,
}

/// A unit sent to the message sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub topic: Topic,
    pub payload: MessagePayload,
}

impl OutboundMessage {
    pub fn new(topic: Topic, device_snapshot: Snapshot, message: impl Into<String>) -> Self {
        Self {
            topic,
            payload: MessagePayload {
                device_snapshot,
                message: message.into(),
            },
        }
    }
}

/// A message received from the automation host.
///
/// Only the `"unlock"` payload is meaningful here. `deviceId` narrows the
/// command to a single device; without it every unlock-capable device is
/// addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
}

impl InboundMessage {
    pub fn new(payload: impl Into<serde_json::Value>) -> Self {
        Self {
            payload: payload.into(),
            device_id: None,
        }
    }

    pub fn for_device(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Reply handed back to the sender of a successful command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub payload: String,
}

impl CommandReply {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}
