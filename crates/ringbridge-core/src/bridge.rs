// ── Bridge: one owning context ──
//
// Wires the session, router, dispatcher, and lifecycle together for one
// hosting context. `start()` authenticates and opens device routing,
// `handle_input()` serves inbound commands, `close()` releases everything
// exactly once. Outcomes are surfaced as status reports.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use ringbridge_api::CredentialService;

use crate::command::CommandDispatcher;
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::latch::LatchListener;
use crate::lifecycle::{CloseReport, LifecycleCoordinator, LifecycleState};
use crate::model::status::{
    STATUS_CONNECTED, STATUS_CONNECTION_ERROR, STATUS_DISCONNECTED, STATUS_NO_CREDENTIALS,
};
use crate::model::{CommandReply, InboundMessage, StatusReport};
use crate::publish::{MessageSink, Publisher, StatusBoard};
use crate::router::DeviceEventRouter;
use crate::session::{Ready, SessionManager, TokenStore};
use crate::store::DeviceRegistry;

/// A running bridge for one hosting context.
///
/// Cheaply cloneable via `Arc<BridgeInner>`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    id: Uuid,
    config: BridgeConfig,
    session: SessionManager,
    registry: Arc<DeviceRegistry>,
    status: Arc<StatusBoard>,
    router: DeviceEventRouter,
    dispatcher: CommandDispatcher,
    lifecycle: LifecycleCoordinator,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        credentials: Arc<dyn CredentialService>,
        store: Arc<dyn TokenStore>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let session = SessionManager::new(credentials, store);
        let registry = Arc::new(DeviceRegistry::new());
        let publisher = Arc::new(Publisher::new(config.namespace.clone(), sink));
        let status = Arc::new(StatusBoard::new());
        let router =
            DeviceEventRouter::new(&config, Arc::clone(&registry), Arc::clone(&publisher));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&registry),
            publisher,
            Arc::clone(&status),
            session.ready(),
        );

        // Inbound commands stop first, then device subscriptions, then the
        // session that owns the client.
        let lifecycle = LifecycleCoordinator::new();
        register_teardown(&lifecycle, "commands", {
            let dispatcher = dispatcher.clone();
            move || {
                dispatcher.close();
                Ok(())
            }
        });
        register_teardown(&lifecycle, "device subscriptions", {
            let router = router.clone();
            move || {
                router.stop();
                Ok(())
            }
        });
        register_teardown(&lifecycle, "session", {
            let session = session.clone();
            move || {
                session.teardown();
                Ok(())
            }
        });

        let id = Uuid::new_v4();
        debug!(context = %id, namespace = %config.namespace, "bridge created");

        Self {
            inner: Arc::new(BridgeInner {
                id,
                config,
                session,
                registry,
                status,
                router,
                dispatcher,
                lifecycle,
            }),
        }
    }

    /// Authenticate and open device routing.
    ///
    /// Returns the number of device subscriptions opened. Calling again once
    /// running returns the current count. Every failure is also reported as
    /// a red status, except a close racing the start.
    pub async fn start(&self) -> Result<usize, CoreError> {
        let inner = &self.inner;
        if inner.lifecycle.state() == LifecycleState::Running {
            debug!(context = %inner.id, "bridge already running");
            return Ok(inner.router.subscription_count());
        }
        inner.lifecycle.begin_start()?;

        let ready = match self.authenticate().await {
            Ok(ready) => ready,
            Err(CoreError::ContextClosed) => return Err(CoreError::ContextClosed),
            Err(e) => {
                inner.status.report(StatusReport::red(STATUS_NO_CREDENTIALS));
                return Err(e);
            }
        };

        let opened = match inner.router.start(&ready).await {
            Ok(opened) => opened,
            Err(CoreError::ContextClosed) => return Err(CoreError::ContextClosed),
            Err(e) => {
                inner.status.report(StatusReport::red(STATUS_CONNECTION_ERROR));
                return Err(e);
            }
        };

        inner.lifecycle.mark_running()?;
        inner.status.report(StatusReport::green(STATUS_CONNECTED));
        info!(context = %inner.id, subscriptions = opened, "bridge running");
        Ok(opened)
    }

    /// Handle an inbound host message.
    pub async fn handle_input(
        &self,
        message: &InboundMessage,
    ) -> Result<Option<CommandReply>, CoreError> {
        if self.inner.lifecycle.state().is_terminal() {
            return Err(CoreError::ContextClosed);
        }
        self.inner.dispatcher.dispatch(message).await
    }

    /// Release every resource held by this context.
    ///
    /// Only the first call does any work; later calls return `None`.
    pub fn close(&self) -> Option<CloseReport> {
        let report = self.inner.lifecycle.close_all()?;
        self.inner.status.report(StatusReport::red(STATUS_DISCONNECTED));
        info!(context = %self.inner.id, "bridge closed");
        Some(report)
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn status(&self) -> Option<StatusReport> {
        self.inner.status.current()
    }

    pub fn status_board(&self) -> &Arc<StatusBoard> {
        &self.inner.status
    }

    pub fn ready(&self) -> LatchListener<Ready> {
        self.inner.session.ready()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn router(&self) -> &DeviceEventRouter {
        &self.inner.router
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.inner.dispatcher
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Seed the store from configuration, then exchange the stored token.
    async fn authenticate(&self) -> Result<Ready, CoreError> {
        let credentials = &self.inner.config.credentials;
        let seed = credentials
            .token
            .as_ref()
            .or(credentials.initial_token.as_ref());
        self.inner.session.initialize(seed)?;
        self.inner.session.authenticate().await
    }
}

fn register_teardown<F>(lifecycle: &LifecycleCoordinator, label: &str, action: F)
where
    F: FnOnce() -> Result<(), CoreError> + Send + 'static,
{
    if let Err(e) = lifecycle.register(label, action) {
        warn!(%label, error = %e, "teardown registration failed");
    }
}
