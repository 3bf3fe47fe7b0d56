//! Collaborator traits implemented by a concrete vendor client.
//!
//! The bridge never speaks HTTP or WebSocket itself. A host plugs in a
//! [`CredentialService`] that turns a refresh token into an authorized
//! [`VendorClient`]; the client then serves directory listings, per-device
//! push streams, and door commands.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use secrecy::SecretString;

use crate::error::Error;
use crate::types::{DeviceEvent, EventKind, LocationRecord, TokenUpdate};

/// Push events for one device and one event kind.
///
/// An `Err` item is a single undeliverable event; the stream stays open.
/// The stream ending means the source is gone.
pub type EventStream = BoxStream<'static, Result<DeviceEvent, Error>>;

/// Refresh tokens issued by the session service over the client's lifetime.
pub type TokenUpdates = BoxStream<'static, Result<TokenUpdate, Error>>;

/// Exchanges a stored refresh token for an authorized client.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Validate `refresh_token` against the session service.
    ///
    /// Rejected tokens surface as errors for which
    /// [`Error::is_auth_rejected`] returns `true`.
    async fn exchange(&self, refresh_token: &SecretString) -> Result<Authorized, Error>;
}

/// Result of a successful token exchange.
pub struct Authorized {
    /// Token to persist in place of the one that was exchanged.
    pub refresh_token: SecretString,
    /// Authenticated handle for directory and command calls.
    pub client: Arc<dyn VendorClient>,
    /// Rotations pushed ahead of expiry.
    pub token_updates: TokenUpdates,
}

/// Enumerates locations and opens device event sources.
#[async_trait]
pub trait Directory: Send + Sync {
    /// List every location visible to the account, with its devices.
    async fn locations(&self) -> Result<Vec<LocationRecord>, Error>;

    /// Open the push stream of `kind` events for one device.
    fn subscribe(&self, device_id: &str, kind: EventKind) -> Result<EventStream, Error>;
}

/// Door commands.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Release the door lock and return the device data afterwards.
    async fn unlock(&self, device_id: &str) -> Result<serde_json::Value, Error>;
}

/// An authenticated vendor session.
pub trait VendorClient: Directory + DeviceControl {
    /// Drop the connection and every stream opened through it.
    fn disconnect(&self);
}
