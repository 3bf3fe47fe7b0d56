// ── Domain model ──
//
// Canonical types the bridge routes and publishes. Raw vendor records
// from `ringbridge_api` are converted in `crate::convert`.

pub mod device;
pub mod ids;
pub mod message;
pub mod status;

pub use device::{Capability, CapabilitySet, DeviceHandle, Snapshot};
pub use ids::{DeviceId, LocationId};
pub use message::{CommandReply, EventName, InboundMessage, MessagePayload, OutboundMessage, Topic};
pub use status::{StatusFill, StatusReport};

// Hardware families are reported by the vendor as-is.
pub use ringbridge_api::{DeviceKind, EventKind};
