// ringbridge-core: session lifecycle, device event routing, and door commands
// between a cloud intercom account and an automation host's message bus.

pub mod bridge;
pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod latch;
pub mod lifecycle;
pub mod model;
pub mod publish;
pub mod router;
pub mod session;
pub mod store;
pub mod subscription;

mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use command::{Command, CommandDispatcher};
pub use config::{BridgeConfig, Credentials, DEFAULT_NAMESPACE};
pub use error::CoreError;
pub use latch::{Latch, LatchListener};
pub use lifecycle::{CloseReport, LifecycleCoordinator, LifecycleState};
pub use publish::{MessageSink, Publisher, StatusBoard};
pub use router::DeviceEventRouter;
pub use session::{MemoryTokenStore, Ready, Session, SessionManager, SessionStatus, TokenStore};
pub use store::DeviceRegistry;
pub use subscription::{Subscription, SubscriptionSource};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Capability, CapabilitySet, CommandReply, DeviceHandle, DeviceId, DeviceKind, EventKind,
    EventName, InboundMessage, LocationId, MessagePayload, OutboundMessage, Snapshot, StatusFill,
    StatusReport, Topic,
};
