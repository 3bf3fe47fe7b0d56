// ── One-shot latched signal ──
//
// A value that, once fired, stays visible to every listener: those that
// were already waiting and those that attach later. Built on a `watch`
// channel holding `Option<T>`.

use tokio::sync::watch;

/// Write side of a latch. Fires at most once.
#[derive(Debug)]
pub struct Latch<T: Clone> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Latch<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Fire the latch with `value`. Returns `false` if it already fired,
    /// in which case the original value is kept.
    pub fn fire(&self, value: T) -> bool {
        let mut slot = Some(value);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = slot.take();
            true
        })
    }

    pub fn is_fired(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The latched value, if fired.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// A listener that resolves once the latch fires, even if that was
    /// before the listener was created.
    pub fn listener(&self) -> LatchListener<T> {
        LatchListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a [`Latch`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LatchListener<T: Clone> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> LatchListener<T> {
    /// The latched value, if fired.
    pub fn get(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the latch to fire.
    /// Returns `None` if the latch was dropped without ever firing.
    pub async fn wait(&mut self) -> Option<T> {
        let fired = self.rx.wait_for(Option::is_some).await.ok()?;
        fired.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_created_after_fire_still_observes() {
        let latch = Latch::new();
        assert!(latch.fire(7_u32));

        let mut late = latch.listener();
        assert_eq!(late.get(), Some(7));
        assert_eq!(late.wait().await, Some(7));
    }

    #[tokio::test]
    async fn waiting_listener_wakes_on_fire() {
        let latch = Latch::new();
        let mut early = latch.listener();

        let waiter = tokio::spawn(async move { early.wait().await });
        tokio::task::yield_now().await;
        latch.fire("ready");

        assert_eq!(waiter.await.unwrap(), Some("ready"));
    }

    #[test]
    fn fires_only_once() {
        let latch = Latch::new();
        assert!(latch.fire(1));
        assert!(!latch.fire(2));
        assert_eq!(latch.get(), Some(1));
        assert!(latch.is_fired());
    }

    #[tokio::test]
    async fn dropped_latch_releases_waiters() {
        let latch: Latch<u8> = Latch::new();
        let mut listener = latch.listener();
        drop(latch);
        assert_eq!(listener.wait().await, None);
    }
}
