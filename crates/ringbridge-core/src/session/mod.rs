// ── Session state ──
//
// `Session` is the in-memory authentication state. The persisted
// credential lives behind a `TokenStore`; a seed token may be stored while
// the session is still unauthenticated.

mod manager;
mod store;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use strum::Display;

pub use manager::{Ready, SessionManager};
pub use store::{MemoryTokenStore, TokenStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticated,
    /// The last exchange failed for a reason other than a rejected token.
    Failed,
}

/// Current authentication state.
///
/// A token is held if and only if the status is `Authenticated`.
#[derive(Debug)]
pub struct Session {
    token: Option<SecretString>,
    status: SessionStatus,
    authenticated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            token: None,
            status: SessionStatus::Unauthenticated,
            authenticated_at: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }

    /// Record a successful exchange.
    pub(crate) fn refresh(&mut self, token: SecretString) {
        self.token = Some(token);
        self.status = SessionStatus::Authenticated;
        self.authenticated_at = Some(Utc::now());
    }

    /// Swap in a rotated token. Ignored unless authenticated.
    pub(crate) fn rotate(&mut self, token: SecretString) -> bool {
        if self.is_authenticated() {
            self.token = Some(token);
            true
        } else {
            false
        }
    }

    /// Drop the token and return to `Unauthenticated`.
    pub(crate) fn reset(&mut self) {
        self.token = None;
        self.status = SessionStatus::Unauthenticated;
        self.authenticated_at = None;
    }

    /// Drop the token and mark the last attempt as failed.
    pub(crate) fn fail(&mut self) {
        self.token = None;
        self.status = SessionStatus::Failed;
        self.authenticated_at = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
