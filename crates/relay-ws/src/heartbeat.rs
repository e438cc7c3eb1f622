//! Heartbeat monitoring for the upstream connection.
//!
//! The exchange pings periodically and expects a pong; any inbound frame
//! proves the link is alive. If nothing arrives within the idle timeout the
//! connection is considered dead even though the socket is still open.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Tracks inbound activity on one connection.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    /// Zero disables idle detection.
    idle_timeout: Duration,
    last_frame: Instant,
    pings_answered: u64,
}

impl HeartbeatMonitor {
    pub fn new(idle_timeout_ms: u64) -> Self {
        Self {
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            last_frame: Instant::now(),
            pings_answered: 0,
        }
    }

    /// Reset on a fresh connection.
    pub fn reset(&mut self) {
        self.last_frame = Instant::now();
        self.pings_answered = 0;
    }

    /// Record that any frame was received.
    pub fn record_frame(&mut self) {
        self.last_frame = Instant::now();
    }

    /// Record that a ping was answered with a pong.
    pub fn record_pong_sent(&mut self) {
        self.pings_answered += 1;
        debug!(pings_answered = self.pings_answered, "Answered upstream ping");
    }

    pub fn enabled(&self) -> bool {
        !self.idle_timeout.is_zero()
    }

    /// Instant at which the connection counts as idle.
    pub fn deadline(&self) -> Instant {
        self.last_frame + self.idle_timeout
    }

    pub fn is_idle(&self) -> bool {
        self.enabled() && Instant::now() >= self.deadline()
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout.as_millis() as u64
    }

    pub fn pings_answered(&self) -> u64 {
        self.pings_answered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_timeout() {
        let mut hb = HeartbeatMonitor::new(1000);
        assert!(!hb.is_idle());

        tokio::time::advance(Duration::from_millis(600)).await;
        hb.record_frame();
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!hb.is_idle(), "frame should push the deadline out");

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(hb.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_idle() {
        let hb = HeartbeatMonitor::new(0);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!hb.enabled());
        assert!(!hb.is_idle());
    }

    #[test]
    fn test_pong_counter_resets() {
        let mut hb = HeartbeatMonitor::new(1000);
        hb.record_pong_sent();
        hb.record_pong_sent();
        assert_eq!(hb.pings_answered(), 2);
        hb.reset();
        assert_eq!(hb.pings_answered(), 0);
    }
}
