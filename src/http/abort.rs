//! Cooperative cancellation token.
//!
//! The transport races every network call against [`AbortSignal::cancelled`];
//! redirect and refresh steps check [`AbortSignal::is_aborted`] between hops.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, warn};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`AbortSignal::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Cancellation token shared between the caller and in-flight requests.
///
/// Cloning yields another handle to the same signal.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    aborted: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    notify: Notify,
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .field("listeners", &self.lock_listeners().len())
            .finish()
    }
}

impl AbortSignal {
    /// Creates a signal that has not been aborted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`dispatch`](Self::dispatch) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Registers a callback invoked on every dispatch.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Marks the signal aborted, then runs every listener.
    ///
    /// A panicking listener is logged and skipped; it cannot prevent the
    /// remaining listeners from running or waiters from waking.
    pub fn dispatch(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);

        // Snapshot so listeners may add or remove listeners without deadlocking.
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        debug!(listeners = listeners.len(), "dispatching abort");

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                warn!("abort listener panicked; continuing with remaining listeners");
            }
        }

        self.inner.notify.notify_waiters();
    }

    /// Completes once the signal is aborted.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a dispatch in between is not missed.
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[test]
    fn test_dispatch_sets_aborted_and_runs_listeners() {
        let signal = AbortSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        signal.add_listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!signal.is_aborted());
        signal.dispatch();

        assert!(signal.is_aborted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let signal = AbortSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        signal.add_listener(|| panic!("broken listener"));
        let seen = Arc::clone(&calls);
        signal.add_listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        signal.dispatch();

        assert!(signal.is_aborted());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second listener must still run");
    }

    #[test]
    fn test_removed_listener_is_not_invoked() {
        let signal = AbortSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = signal.add_listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(signal.remove_listener(id));
        assert!(!signal.remove_listener(id));
        signal.dispatch();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let signal = AbortSignal::new();
        let handle = signal.clone();
        handle.dispatch();
        assert!(signal.is_aborted());
    }

    #[test]
    fn test_cancelled_wakes_on_dispatch() {
        let signal = AbortSignal::new();
        let mut waiter = task::spawn(signal.cancelled());

        assert_pending!(waiter.poll());
        signal.dispatch();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_cancelled_is_ready_when_already_aborted() {
        let signal = AbortSignal::new();
        signal.dispatch();
        let mut waiter = task::spawn(signal.cancelled());
        assert_ready!(waiter.poll());
    }
}
