// ── Context lifecycle ──
//
// Tracks `Created -> Starting -> Running -> Closing -> Closed` and runs the
// registered teardown actions exactly once, in registration order, when the
// owning context closes. A failing or panicking teardown is recorded and
// does not stop the rest.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;

use strum::Display;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::sync::lock;

/// Lifecycle of one owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    Created,
    /// Session authentication in flight.
    Starting,
    /// Subscriptions active.
    Running,
    Closing,
    Closed,
}

impl LifecycleState {
    /// `Closing` and `Closed` have no way out.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

type TeardownFn = Box<dyn FnOnce() -> Result<(), CoreError> + Send>;

struct Teardown {
    label: String,
    action: TeardownFn,
}

/// Outcome of [`LifecycleCoordinator::close_all`].
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Teardown actions that ran without error.
    pub released: Vec<String>,
    /// One entry per failed teardown action.
    pub failures: Vec<CoreError>,
}

impl CloseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of teardown actions this close ran.
    pub fn ran(&self) -> usize {
        self.released.len() + self.failures.len()
    }
}

/// Binds teardown actions to a single close signal.
pub struct LifecycleCoordinator {
    state: watch::Sender<LifecycleState>,
    teardowns: Mutex<Vec<Teardown>>,
    closed: CancellationToken,
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self {
            state,
            teardowns: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Cancelled once closing begins.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Add a teardown action.
    ///
    /// If the context is already closing, the action runs immediately and
    /// its failure is returned.
    pub fn register<F>(&self, label: impl Into<String>, action: F) -> Result<(), CoreError>
    where
        F: FnOnce() -> Result<(), CoreError> + Send + 'static,
    {
        let label = label.into();
        {
            let mut teardowns = lock(&self.teardowns);
            if !self.state().is_terminal() {
                debug!(%label, "teardown registered");
                teardowns.push(Teardown {
                    label,
                    action: Box::new(action),
                });
                return Ok(());
            }
        }
        debug!(%label, "context already closing -- running teardown now");
        run_teardown(Teardown {
            label,
            action: Box::new(action),
        })
        .map(|_| ())
    }

    /// `Created -> Starting`. Repeating while starting is allowed.
    pub fn begin_start(&self) -> Result<(), CoreError> {
        self.transition(
            |s| matches!(s, LifecycleState::Created | LifecycleState::Starting),
            LifecycleState::Starting,
        )
    }

    /// `Starting -> Running`.
    pub fn mark_running(&self) -> Result<(), CoreError> {
        self.transition(
            |s| matches!(s, LifecycleState::Starting | LifecycleState::Running),
            LifecycleState::Running,
        )
    }

    /// Run every teardown exactly once, in registration order.
    ///
    /// Only the first call does any work; later calls return `None`.
    pub fn close_all(&self) -> Option<CloseReport> {
        let began = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = LifecycleState::Closing;
            true
        });
        if !began {
            debug!("close already performed");
            return None;
        }
        self.closed.cancel();

        let teardowns = std::mem::take(&mut *lock(&self.teardowns));
        let mut report = CloseReport::default();
        for teardown in teardowns {
            match run_teardown(teardown) {
                Ok(label) => report.released.push(label),
                Err(e) => {
                    warn!(error = %e, "teardown failed");
                    report.failures.push(e);
                }
            }
        }

        self.state.send_replace(LifecycleState::Closed);
        info!(
            released = report.released.len(),
            failed = report.failures.len(),
            "context closed"
        );
        Some(report)
    }

    fn transition(
        &self,
        allowed: impl Fn(LifecycleState) -> bool,
        next: LifecycleState,
    ) -> Result<(), CoreError> {
        let mut moved = false;
        self.state.send_if_modified(|state| {
            if !allowed(*state) {
                return false;
            }
            moved = true;
            let changed = *state != next;
            *state = next;
            changed
        });
        if moved {
            Ok(())
        } else {
            Err(CoreError::ContextClosed)
        }
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one teardown, turning a panic into a recorded failure.
fn run_teardown(teardown: Teardown) -> Result<String, CoreError> {
    let Teardown { label, action } = teardown;
    match catch_unwind(AssertUnwindSafe(action)) {
        Ok(Ok(())) => {
            debug!(%label, "released");
            Ok(label)
        }
        Ok(Err(e)) => Err(CoreError::Teardown {
            label,
            message: e.to_string(),
        }),
        Err(_) => Err(CoreError::Teardown {
            label,
            message: "teardown panicked".into(),
        }),
    }
}
