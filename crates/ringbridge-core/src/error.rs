// ── Core error types ──
//
// User-facing errors from ringbridge-core. Vendor transport failures are
// translated into the bridge taxonomy: authentication, directory, command,
// and event delivery. Callers never match on `ringbridge_api::Error`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("No credentials -- supply an initial token")]
    NoCredentials,

    #[error("Session not ready -- authenticate first")]
    NotReady,

    // ── Directory ────────────────────────────────────────────────────
    #[error("Device directory unavailable: {message}")]
    Directory { message: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Command failed on device {device_id}: {message}")]
    Command { device_id: String, message: String },

    #[error("Unlock already in flight for device {device_id}")]
    CommandInFlight { device_id: String },

    #[error("Device {device_id} does not support {operation}")]
    Unsupported {
        device_id: String,
        operation: String,
    },

    // ── Event delivery ───────────────────────────────────────────────
    #[error("Dropped event for device {device_id}: {message}")]
    Delivery { device_id: String, message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Context closed")]
    ContextClosed,

    #[error("Teardown of {label} failed: {message}")]
    Teardown { label: String, message: String },

    // ── Persistence / configuration ──────────────────────────────────
    #[error("Token persistence failed: {message}")]
    Persistence { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for errors that need a new token from an operator.
    pub fn needs_reauthorization(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::NoCredentials)
    }

    /// Translate a vendor failure raised while talking to one device.
    pub(crate) fn command(device_id: &str, err: &ringbridge_api::Error) -> Self {
        Self::Command {
            device_id: device_id.to_owned(),
            message: err.to_string(),
        }
    }

    pub(crate) fn directory(err: &ringbridge_api::Error) -> Self {
        Self::Directory {
            message: err.to_string(),
        }
    }
}

// ── Conversion from vendor-layer errors ──────────────────────────────

impl From<ringbridge_api::Error> for CoreError {
    fn from(err: ringbridge_api::Error) -> Self {
        match err {
            ringbridge_api::Error::InvalidToken { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ringbridge_api::Error::TokenExpired => CoreError::AuthenticationFailed {
                message: "Refresh token expired -- re-authorization required".into(),
            },
            ringbridge_api::Error::TwoFactorRequired => CoreError::AuthenticationFailed {
                message: "Two-factor verification required".into(),
            },
            ringbridge_api::Error::Api {
                status: 401,
                message,
            } => CoreError::AuthenticationFailed { message },
            ringbridge_api::Error::UnknownDevice { device_id } => CoreError::DeviceNotFound {
                identifier: device_id,
            },
            ringbridge_api::Error::Unsupported {
                device_id,
                operation,
            } => CoreError::Unsupported {
                device_id,
                operation: operation.to_owned(),
            },
            ringbridge_api::Error::StreamClosed { reason } => CoreError::Delivery {
                device_id: String::new(),
                message: reason,
            },
            ringbridge_api::Error::Deserialization { message, body: _ } => CoreError::Delivery {
                device_id: String::new(),
                message: format!("Deserialization error: {message}"),
            },
            other @ (ringbridge_api::Error::Transport(_)
            | ringbridge_api::Error::Timeout { .. }
            | ringbridge_api::Error::RateLimited { .. }
            | ringbridge_api::Error::Api { .. }) => CoreError::Directory {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_token_maps_to_authentication_failure() {
        let err = CoreError::from(ringbridge_api::Error::InvalidToken {
            message: "revoked".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { ref message } if message == "revoked"));
        assert!(err.needs_reauthorization());
    }

    #[test]
    fn transport_failure_maps_to_directory_error() {
        let err = CoreError::from(ringbridge_api::Error::Transport("connection reset".into()));
        assert!(matches!(err, CoreError::Directory { .. }));
        assert!(!err.needs_reauthorization());
    }

    #[test]
    fn command_error_names_device() {
        let err = CoreError::command("D1", &ringbridge_api::Error::Timeout { timeout_secs: 5 });
        assert_eq!(
            err.to_string(),
            "Command failed on device D1: Request timed out after 5s"
        );
    }
}
