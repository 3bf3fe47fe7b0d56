// ── Device domain types ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use ringbridge_api::{DeviceKind, EventKind};

use super::ids::{DeviceId, LocationId};

/// Something a device can do or report. Fixed at discovery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Emits ding events.
    Ding,
    /// Accepts unlock commands and emits unlocked events.
    Unlock,
    /// Emits generic data updates.
    StateUpdate,
}

impl Capability {
    /// The push event family backing this capability.
    pub fn event_kind(self) -> EventKind {
        match self {
            Self::Ding => EventKind::Ding,
            Self::Unlock => EventKind::Unlocked,
            Self::StateUpdate => EventKind::DataUpdate,
        }
    }
}

/// Ordered set of capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Capabilities of an intercom: ding, unlock, and data updates.
    pub fn intercom() -> Self {
        Capability::iter().collect()
    }

    /// Capabilities implied by a hardware family.
    pub fn for_kind(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Intercom => Self::intercom(),
            DeviceKind::Doorbell => [Capability::Ding, Capability::StateUpdate]
                .into_iter()
                .collect(),
            DeviceKind::Camera | DeviceKind::Chime => {
                std::iter::once(Capability::StateUpdate).collect()
            }
            DeviceKind::Other => Self::default(),
        }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// `true` if every capability in `required` is present.
    pub fn covers(&self, required: &CapabilitySet) -> bool {
        required.0.is_subset(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Provider-defined device state, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(serde_json::Value);

impl Snapshot {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Device data is always a JSON object; anything else is malformed.
    pub fn is_well_formed(&self) -> bool {
        self.0.is_object()
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// One physical device the bridge routes.
///
/// Identity and capabilities never change after discovery. The latest
/// state is replaced wholesale on every observation and broadcast through
/// a `watch` channel, so consumers can follow "current truth" directly.
#[derive(Debug)]
pub struct DeviceHandle {
    id: DeviceId,
    location_id: LocationId,
    kind: DeviceKind,
    name: String,
    capabilities: CapabilitySet,
    state: watch::Sender<Snapshot>,
}

impl DeviceHandle {
    pub fn new(
        id: DeviceId,
        location_id: LocationId,
        kind: DeviceKind,
        name: impl Into<String>,
        capabilities: CapabilitySet,
        initial: Snapshot,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            id,
            location_id,
            kind,
            name: name.into(),
            capabilities,
            state,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn location_id(&self) -> &LocationId {
        &self.location_id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Event families to subscribe to, one per capability.
    pub fn event_kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.capabilities.iter().map(Capability::event_kind)
    }

    /// Title-case family label used in human-readable messages.
    pub fn label(&self) -> &'static str {
        match self.kind {
            DeviceKind::Intercom => "Intercom",
            DeviceKind::Doorbell => "Doorbell",
            DeviceKind::Camera => "Camera",
            DeviceKind::Chime => "Chime",
            DeviceKind::Other => "Device",
        }
    }

    /// The most recently observed state.
    pub fn latest_state(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Replace the latest state, returning the previous one.
    pub(crate) fn replace_state(&self, snapshot: Snapshot) -> Snapshot {
        // `send_replace` updates even with zero receivers.
        self.state.send_replace(snapshot)
    }

    /// Subscribe to state replacements.
    pub fn watch_state(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// `Stream` of states, starting with the current one.
    pub fn state_stream(&self) -> WatchStream<Snapshot> {
        WatchStream::new(self.state.subscribe())
    }
}
