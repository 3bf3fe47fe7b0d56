// ── Runtime bridge configuration ──
//
// These types describe what the bridge publishes and which credentials
// it starts from. They never touch disk: `ringbridge-config` (or any
// other host) builds a `BridgeConfig` and hands it in.

use secrecy::SecretString;

use crate::model::{Capability, CapabilitySet};

/// Default first topic segment.
pub const DEFAULT_NAMESPACE: &str = "ring";

/// Credential fields held by the hosting context.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Seed token. Only used when no token has been stored yet.
    pub initial_token: Option<SecretString>,
    /// Current token, as last persisted.
    pub token: Option<SecretString>,
}

/// Configuration for a single bridge context.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// First topic segment of every outbound message.
    pub namespace: String,
    /// Credentials to seed the session from.
    pub credentials: Credentials,
    /// Capabilities a device must expose to be routed.
    /// Defaults to intercom-class devices (ding + unlock).
    pub required_capabilities: CapabilitySet,
    /// Announce each enumerated device on `<ns>/<location>/device/<device>`.
    pub announce_devices: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.into(),
            credentials: Credentials::default(),
            required_capabilities: [Capability::Ding, Capability::Unlock].into_iter().collect(),
            announce_devices: true,
        }
    }
}
