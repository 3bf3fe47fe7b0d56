// ── Subscriptions ──
//
// A binding from one push source to a handler task. Deactivation flips an
// atomic flag exactly once and cancels the source; the handler checks the
// flag before acting on every item, so an event that races with teardown
// is dropped instead of republished.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::TakeUntil;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::model::{DeviceId, EventKind};

/// What a subscription is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionSource {
    /// Refresh tokens pushed by the session service.
    TokenRotation,
    /// One event family of one device.
    Device { device_id: DeviceId, kind: EventKind },
}

impl fmt::Display for SubscriptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenRotation => f.write_str("token-rotation"),
            Self::Device { device_id, kind } => write!(f, "{device_id}/{kind}"),
        }
    }
}

/// An active binding. Dropping it deactivates it.
#[derive(Debug)]
pub struct Subscription {
    source: SubscriptionSource,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(source: SubscriptionSource) -> Self {
        Self {
            source,
            active: Arc::new(AtomicBool::new(true)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn source(&self) -> &SubscriptionSource {
        &self.source
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Deactivate the binding. Returns `true` only for the call that
    /// actually performed the transition.
    pub fn deactivate(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        if was_active {
            self.cancel.cancel();
            tracing::debug!(source = %self.source, "subscription deactivated");
        }
        was_active
    }

    /// Handler-side view of this subscription.
    pub(crate) fn guard(&self) -> SubscriptionGuard {
        SubscriptionGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Wrap `stream` so it ends as soon as this subscription is deactivated.
    pub(crate) fn bind<S: Stream>(&self, stream: S) -> TakeUntil<S, WaitForCancellationFutureOwned> {
        stream.take_until(self.cancel.clone().cancelled_owned())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Cloneable liveness check carried by the handler task.
#[derive(Debug, Clone)]
pub(crate) struct SubscriptionGuard {
    active: Arc<AtomicBool>,
}

impl SubscriptionGuard {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
