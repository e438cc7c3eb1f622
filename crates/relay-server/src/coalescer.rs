//! Broadcast throttle.
//!
//! Owns an optional armed deadline and a pending flag. `signal()` marks data
//! pending and arms the deadline if it is not armed already; `fire()` disarms
//! it once due and reports whether a flush should happen. Any number of
//! signals inside one interval collapse into a single flush.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Coalescer {
    interval: Duration,
    deadline: Option<Instant>,
    pending: bool,
}

impl Coalescer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            pending: false,
        }
    }

    /// Mark data pending. Returns the deadline when this call armed it.
    pub fn signal(&mut self, now: Instant) -> Option<Instant> {
        self.pending = true;
        if self.deadline.is_some() {
            return None;
        }
        let deadline = now + self.interval;
        self.deadline = Some(deadline);
        Some(deadline)
    }

    /// Disarm the deadline if it is due. Returns `true` when data was pending,
    /// in which case the pending flag is cleared and the caller must flush.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                std::mem::take(&mut self.pending)
            }
            _ => false,
        }
    }

    /// Drop the pending flag after an out-of-band flush. An armed deadline
    /// stays armed and will fire without flushing.
    pub fn clear_pending(&mut self) {
        self.pending = false;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(1000);

    #[test]
    fn test_first_signal_arms_once() {
        let start = Instant::now();
        let mut c = Coalescer::new(INTERVAL);

        assert_eq!(c.signal(start), Some(start + INTERVAL));
        assert_eq!(c.signal(start + Duration::from_millis(10)), None);
        assert_eq!(c.signal(start + Duration::from_millis(900)), None);
        assert_eq!(c.deadline(), Some(start + INTERVAL));
        assert!(c.is_pending());
    }

    #[test]
    fn test_fire_only_when_due() {
        let start = Instant::now();
        let mut c = Coalescer::new(INTERVAL);
        c.signal(start);

        assert!(!c.fire(start + Duration::from_millis(999)));
        assert!(c.deadline().is_some());

        assert!(c.fire(start + INTERVAL));
        assert!(!c.is_pending());
        assert!(c.deadline().is_none());

        // Nothing armed, nothing to do.
        assert!(!c.fire(start + INTERVAL * 2));
    }

    #[test]
    fn test_cleared_pending_fires_without_flush() {
        let start = Instant::now();
        let mut c = Coalescer::new(INTERVAL);
        c.signal(start);
        c.clear_pending();

        assert!(!c.fire(start + INTERVAL));
        assert!(c.deadline().is_none());

        // Next signal re-arms from its own time.
        let later = start + INTERVAL + Duration::from_millis(5);
        assert_eq!(c.signal(later), Some(later + INTERVAL));
    }

    #[test]
    fn test_flush_count_bounded_under_burst() {
        let start = Instant::now();
        let mut c = Coalescer::new(INTERVAL);
        let mut flushes = 0;

        // One signal every 10ms for 5s, checking the deadline at each step.
        let window = Duration::from_millis(5000);
        let mut t = start;
        while t <= start + window {
            if c.fire(t) {
                flushes += 1;
            }
            c.signal(t);
            t += Duration::from_millis(10);
        }

        let bound = (window.as_millis() as f64 / INTERVAL.as_millis() as f64).ceil() as usize + 1;
        assert!(flushes <= bound, "{flushes} flushes exceeds bound {bound}");
        assert!(flushes >= 4);
    }
}
