//! Coalescing "new data available" signal.
//!
//! Writers call `mark_dirty()` as often as they like; any number of calls
//! between two `wait()`s collapse into a single wakeup.

use std::sync::Arc;
use tokio::sync::Notify;

/// Cloneable handle shared by the cache writers and the broadcaster.
#[derive(Debug, Clone, Default)]
pub struct UpdateSignal {
    notify: Arc<Notify>,
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that new data is available. Never blocks.
    pub fn mark_dirty(&self) {
        self.notify.notify_one();
    }

    /// Wait until `mark_dirty()` has been called at least once since the
    /// previous wakeup.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_signals_coalesce() {
        let signal = UpdateSignal::new();

        signal.mark_dirty();
        signal.mark_dirty();
        signal.mark_dirty();

        let mut first = task::spawn(signal.wait());
        assert_ready!(first.poll());

        let mut second = task::spawn(signal.wait());
        assert_pending!(second.poll());
    }

    #[test]
    fn test_wakes_registered_waiter() {
        let signal = UpdateSignal::new();
        let writer = signal.clone();

        let mut waiter = task::spawn(signal.wait());
        assert_pending!(waiter.poll());

        writer.mark_dirty();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }
}
