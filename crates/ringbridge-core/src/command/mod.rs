// ── Command API ──
//
// Inbound host messages are parsed into a `Command`. Only unlock is
// recognized; anything else parses to `None` and is ignored.

mod dispatcher;

pub use dispatcher::CommandDispatcher;

use crate::model::{DeviceId, InboundMessage};

/// Payload value that triggers an unlock.
pub const UNLOCK_PAYLOAD: &str = "unlock";

/// A write operation against one or more devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Release the door. `None` addresses every unlock-capable device.
    Unlock { device_id: Option<DeviceId> },
}

impl Command {
    /// Parse an inbound message. Unrecognized payloads yield `None`.
    pub fn parse(message: &InboundMessage) -> Option<Self> {
        match message.payload.as_str().map(str::trim) {
            Some(UNLOCK_PAYLOAD) => Some(Self::Unlock {
                device_id: message.device_id.clone(),
            }),
            _ => None,
        }
    }
}
