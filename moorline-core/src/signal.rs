//! Sticky signal flags
//!
//! The accept loop and the exchange operations hand control back and forth
//! through a small set of manual-reset flags instead of sharing locks. A flag
//! stays set until its observer explicitly clears it; waiting on a flag
//! consumes it, which is exactly the clear-before-reuse discipline the
//! protocol requires.
//!
//! Each flag is backed by a single-slot channel: `set` fills the slot (a
//! no-op when already full, so setting is sticky and idempotent) and waiting
//! drains it. A plain boolean would reintroduce the races this scheme avoids.

use std::time::Duration;

/// A sticky, manual-reset signal flag.
///
/// Cheap to clone; clones observe the same flag. Each flag is written by one
/// task and waited on by another, so the consume-on-wait semantics never race.
///
/// # Examples
///
/// ```
/// use moorline_core::signal::Signal;
///
/// let flag = Signal::new();
/// assert!(!flag.is_set());
/// flag.set();
/// flag.set(); // sticky: no effect while already set
/// assert!(flag.is_set());
/// flag.clear();
/// assert!(!flag.is_set());
/// ```
#[derive(Debug, Clone)]
pub struct Signal {
    tx: flume::Sender<()>,
    rx: flume::Receiver<()>,
}

impl Signal {
    /// Create a new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self { tx, rx }
    }

    /// Raise the flag. Idempotent: raising a raised flag changes nothing.
    pub fn set(&self) {
        let _ = self.tx.try_send(());
    }

    /// Lower the flag. Idempotent: clearing a clear flag changes nothing.
    pub fn clear(&self) {
        let _ = self.rx.try_recv();
    }

    /// Observe the flag without consuming it.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Suspend until the flag is set, then consume it.
    ///
    /// The consuming wait is the observer-side clear: after `wait` returns,
    /// the flag is ready for the next cycle.
    pub async fn wait(&self) {
        // Cannot fail: the flag holds its own sender.
        let _ = self.rx.recv_async().await;
    }

    /// Bounded wait. Returns `true` if the flag was observed (and consumed)
    /// within `timeout`, `false` if the wait expired with the flag unset.
    ///
    /// The deadline is enforced by flume's synchronous receive on a blocking
    /// thread, not by a runtime timer, so it fires on schedule regardless of
    /// what other timers the runtime has pending.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let rx = self.rx.clone();
        compio::runtime::spawn_blocking(move || rx.recv_timeout(timeout).is_ok()).await
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// The five process-wide flags coordinating the accept loop, the exchange
/// operations and the external driver.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    /// Set by a receive operation when data arrived or the peer closed.
    pub received: Signal,
    /// Set by a send operation once the full buffer went out.
    pub sent: Signal,
    /// Set by the accept loop when a new connection occupies the slot;
    /// consumed by the external driver before it touches the socket.
    pub accepted: Signal,
    /// Set by the driver on normal completion or by the exchange error path;
    /// consumed (bounded) by the accept loop before it closes the connection.
    pub finished: Signal,
    /// Set when a reply has been staged for sending; cleared once it is sent.
    pub ready_to_send: Signal,
}

impl SignalSet {
    /// Create a set of unset flags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticky_set_and_clear() {
        let flag = Signal::new();
        assert!(!flag.is_set());

        flag.set();
        flag.set();
        assert!(flag.is_set());

        flag.clear();
        assert!(!flag.is_set());

        // Clearing an already-clear flag is a safe no-op.
        flag.clear();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = Signal::new();
        let observer = flag.clone();

        flag.set();
        assert!(observer.is_set());

        observer.clear();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_wait_consumes_flag() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let flag = Signal::new();
            flag.set();

            flag.wait().await;
            assert!(!flag.is_set());
        });
    }

    #[test]
    fn test_wait_timeout_expires_on_unset_flag() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let flag = Signal::new();
            let observed = flag.wait_timeout(Duration::from_millis(20)).await;
            assert!(!observed);
        });
    }

    #[test]
    fn test_wait_timeout_observes_set_from_other_task() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let flag = Signal::new();
            let setter = flag.clone();

            let task = compio::runtime::spawn(async move {
                compio::time::sleep(Duration::from_millis(10)).await;
                setter.set();
            });

            let observed = flag.wait_timeout(Duration::from_secs(1)).await;
            assert!(observed);
            assert!(!flag.is_set()); // consumed by the waiter
            task.await;
        });
    }

    #[test]
    fn test_wait_timeout_not_starved_by_pending_timers() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let flag = Signal::new();

            // An unrelated long timer elsewhere on the runtime must not
            // delay the bounded wait past its own deadline.
            let long_timer = compio::runtime::spawn(async {
                compio::time::sleep(Duration::from_secs(30)).await;
            });

            let started = std::time::Instant::now();
            let observed = flag.wait_timeout(Duration::from_millis(50)).await;
            assert!(!observed);
            assert!(started.elapsed() < Duration::from_secs(5));

            drop(long_timer);
        });
    }

    #[test]
    fn test_signal_set_flags_are_independent() {
        let signals = SignalSet::new();
        signals.accepted.set();
        assert!(signals.accepted.is_set());
        assert!(!signals.finished.is_set());
        assert!(!signals.received.is_set());
        assert!(!signals.sent.is_set());
        assert!(!signals.ready_to_send.is_set());
    }
}
