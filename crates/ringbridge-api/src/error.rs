use thiserror::Error;

/// Top-level error type for the `ringbridge-api` crate.
///
/// Every failure a vendor client can hand back through the collaborator
/// traits: token exchange, directory enumeration, event streams, and
/// device commands. `ringbridge-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The refresh token was rejected by the session service.
    #[error("Invalid refresh token: {message}")]
    InvalidToken { message: String },

    /// The refresh token expired before it could be exchanged.
    #[error("Refresh token expired -- re-authorization required")]
    TokenExpired,

    /// Account requires a verification code before a token can be issued.
    #[error("Two-factor verification required")]
    TwoFactorRequired,

    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, TLS failure, etc.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Rate limited by the vendor API. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Vendor API ──────────────────────────────────────────────────
    /// Structured error returned by the vendor API.
    #[error("API error (HTTP {status}): {message}")]
    Api { message: String, status: u16 },

    /// The requested device is unknown to the vendor.
    #[error("Unknown device: {device_id}")]
    UnknownDevice { device_id: String },

    /// The device does not support the requested operation.
    #[error("Device {device_id} does not support {operation}")]
    Unsupported {
        device_id: String,
        operation: &'static str,
    },

    // ── Push events ─────────────────────────────────────────────────
    /// The push event channel for a device closed unexpectedly.
    #[error("Event stream closed: {reason}")]
    StreamClosed { reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Payload could not be decoded, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the stored token is no longer usable and an
    /// operator has to supply a new one.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::TokenExpired | Self::TwoFactorRequired
        ) || matches!(self, Self::Api { status: 401, .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownDevice { .. } | Self::Api { status: 404, .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: String::new(),
        }
    }
}
