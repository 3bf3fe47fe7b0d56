// ── Session lifecycle ──
//
// Owns the `Session`, exchanges the stored token with the credential
// service, keeps the persisted token current as the vendor rotates it,
// and fires the ready latch exactly once per context.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ringbridge_api::{CredentialService, TokenUpdates, VendorClient};

use super::store::TokenStore;
use super::{Session, SessionStatus};
use crate::error::CoreError;
use crate::latch::{Latch, LatchListener};
use crate::subscription::{Subscription, SubscriptionSource};
use crate::sync::lock;

// ── Ready ────────────────────────────────────────────────────────

/// Proof of authentication, carried by the ready latch.
///
/// The only way to reach the vendor client: it cannot be observed before
/// the session is authenticated.
#[derive(Clone)]
pub struct Ready {
    client: Arc<dyn VendorClient>,
    authenticated_at: DateTime<Utc>,
}

impl Ready {
    pub fn client(&self) -> &Arc<dyn VendorClient> {
        &self.client
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("authenticated_at", &self.authenticated_at)
            .finish_non_exhaustive()
    }
}

// ── SessionManager ───────────────────────────────────────────────

/// Orchestrates the session against the credential service.
///
/// Cheaply cloneable via `Arc<SessionInner>`.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    credentials: Arc<dyn CredentialService>,
    store: Arc<dyn TokenStore>,
    session: Arc<Mutex<Session>>,
    ready: Latch<Ready>,
    rotation: Mutex<Option<Subscription>>,
    client: Mutex<Option<Arc<dyn VendorClient>>>,
    auth_lock: tokio::sync::Mutex<()>,
    closed: CancellationToken,
}

impl SessionManager {
    pub fn new(credentials: Arc<dyn CredentialService>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                credentials,
                store,
                session: Arc::new(Mutex::new(Session::new())),
                ready: Latch::new(),
                rotation: Mutex::new(None),
                client: Mutex::new(None),
                auth_lock: tokio::sync::Mutex::new(()),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Store `seed` as the current token if nothing is stored yet.
    ///
    /// Returns `true` if the seed was stored.
    pub fn initialize(&self, seed: Option<&SecretString>) -> Result<bool, CoreError> {
        if self.inner.store.load()?.is_some() {
            debug!("stored token present -- seed ignored");
            return Ok(false);
        }
        let Some(seed) = seed else {
            return Ok(false);
        };
        self.inner.store.save(seed)?;
        debug!("seed token stored");
        Ok(true)
    }

    /// Exchange the stored token and fire the ready latch.
    ///
    /// Any exchange failure clears the stored token. A rejected token resets
    /// the session; other failures mark it `Failed`. Neither is retried here.
    /// Once ready, further calls return the latched value.
    pub async fn authenticate(&self) -> Result<Ready, CoreError> {
        let _serialized = self.inner.auth_lock.lock().await;

        if self.inner.closed.is_cancelled() {
            return Err(CoreError::ContextClosed);
        }
        if let Some(ready) = self.inner.ready.get() {
            return Ok(ready);
        }

        let Some(token) = self.inner.store.load()? else {
            lock(&self.inner.session).reset();
            warn!("no stored token -- authentication skipped");
            return Err(CoreError::NoCredentials);
        };

        let authorized = match self.inner.credentials.exchange(&token).await {
            Ok(authorized) => authorized,
            Err(e) if e.is_auth_rejected() => {
                warn!(error = %e, "token rejected -- clearing stored credentials");
                self.reset()?;
                return Err(CoreError::from(e));
            }
            Err(e) => {
                warn!(error = %e, "token exchange failed -- clearing stored credentials");
                lock(&self.inner.session).fail();
                self.inner.store.clear()?;
                return Err(CoreError::AuthenticationFailed {
                    message: e.to_string(),
                });
            }
        };

        if self.inner.closed.is_cancelled() {
            debug!("context closed during exchange -- releasing client");
            authorized.client.disconnect();
            return Err(CoreError::ContextClosed);
        }

        if let Err(e) = self.inner.store.save(&authorized.refresh_token) {
            authorized.client.disconnect();
            lock(&self.inner.session).fail();
            return Err(e);
        }
        lock(&self.inner.session).refresh(authorized.refresh_token);

        *lock(&self.inner.rotation) = Some(self.spawn_rotation(authorized.token_updates));
        *lock(&self.inner.client) = Some(Arc::clone(&authorized.client));

        // `teardown()` may have run after the check above and found nothing
        // to release.
        if self.inner.closed.is_cancelled() {
            debug!("context closed while storing the session -- releasing client");
            self.release();
            lock(&self.inner.session).reset();
            return Err(CoreError::ContextClosed);
        }

        let ready = Ready {
            client: authorized.client,
            authenticated_at: Utc::now(),
        };
        self.inner.ready.fire(ready.clone());
        info!("session authenticated");
        Ok(ready)
    }

    /// Persist a token issued ahead of expiry. Last write wins.
    pub fn on_token_rotated(&self, new_token: SecretString) {
        persist_rotation(&*self.inner.store, &self.inner.session, new_token);
    }

    /// Clear the stored token and return to `Unauthenticated`.
    pub fn reset(&self) -> Result<(), CoreError> {
        lock(&self.inner.session).reset();
        self.inner.store.clear()
    }

    /// Cancel the rotation subscription and release the client.
    ///
    /// Safe before authentication and safe to repeat.
    pub fn teardown(&self) {
        self.inner.closed.cancel();
        self.release();
    }

    // ── Observation ──────────────────────────────────────────────

    /// Listener for the ready latch; resolves even if attached late.
    pub fn ready(&self) -> LatchListener<Ready> {
        self.inner.ready.listener()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_fired()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.inner.session).status()
    }

    /// The token currently held by the session, if authenticated.
    pub fn current_token(&self) -> Option<SecretString> {
        lock(&self.inner.session).token().cloned()
    }

    /// The token as last persisted.
    pub fn stored_token(&self) -> Result<Option<SecretString>, CoreError> {
        self.inner.store.load()
    }

    pub fn is_rotation_active(&self) -> bool {
        lock(&self.inner.rotation)
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Take and release whatever handles authentication left behind.
    fn release(&self) {
        if let Some(rotation) = lock(&self.inner.rotation).take() {
            rotation.deactivate();
        }
        if let Some(client) = lock(&self.inner.client).take() {
            client.disconnect();
            debug!("vendor client released");
        }
    }

    fn spawn_rotation(&self, updates: TokenUpdates) -> Subscription {
        let subscription = Subscription::new(SubscriptionSource::TokenRotation);
        let guard = subscription.guard();
        let mut updates = Box::pin(subscription.bind(updates));
        let store = Arc::clone(&self.inner.store);
        let session = Arc::clone(&self.inner.session);

        tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                if !guard.is_active() {
                    break;
                }
                match update {
                    Ok(update) => persist_rotation(&*store, &session, update.new_token),
                    Err(e) => warn!(error = %e, "token rotation delivery failed"),
                }
            }
            debug!("token rotation stream ended");
        });

        subscription
    }
}

/// Write a rotated token through to the store and the live session.
/// Persistence failures are logged; rotation is best-effort.
fn persist_rotation(store: &dyn TokenStore, session: &Mutex<Session>, token: SecretString) {
    if let Err(e) = store.save(&token) {
        warn!(error = %e, "failed to persist rotated token");
    }
    if lock(session).rotate(token) {
        debug!("refresh token rotated");
    }
}
