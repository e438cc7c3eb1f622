//! Throttled price broadcaster.
//!
//! Tick writes only raise the `UpdateSignal`; the broadcaster turns those
//! wakeups into at most one push per interval through a `Coalescer`. A rate
//! change bypasses the throttle and pushes immediately.

use crate::coalescer::Coalescer;
use crate::error::ServerResult;
use crate::state::RelayState;
use relay_core::UpdateSignal;
use relay_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Why a flush happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastKind {
    /// Throttle deadline reached with data pending.
    Scheduled,
    /// Conversion rate changed.
    OutOfBand,
}

impl BroadcastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::OutOfBand => "out_of_band",
        }
    }
}

pub struct Broadcaster {
    state: RelayState,
    signal: UpdateSignal,
    coalescer: Coalescer,
}

impl Broadcaster {
    pub fn new(state: RelayState, signal: UpdateSignal, interval: Duration) -> Self {
        Self {
            state,
            signal,
            coalescer: Coalescer::new(interval),
        }
    }

    /// Serialize the current snapshot and queue it for every subscriber.
    ///
    /// Returns the number of subscribers that accepted the payload.
    pub fn flush(&self, kind: BroadcastKind) -> ServerResult<usize> {
        let message = self.state.price_update();
        let payload: Arc<str> = serde_json::to_string(&message)?.into();
        let receivers = self.state.registry().fan_out(payload);
        Metrics::broadcast(kind.as_str(), receivers);

        match kind {
            BroadcastKind::Scheduled => {
                if let Some(first) = message.data.first().filter(|e| e.has_data()) {
                    info!(
                        symbol = %first.symbol,
                        price_usd = first.price_usd,
                        price_inr = first.price_inr,
                        change_24h = first.change_24h,
                        receivers,
                        "Broadcast"
                    );
                } else {
                    debug!(receivers, "Broadcast");
                }
            }
            BroadcastKind::OutOfBand => {
                info!(rate = message.inr_rate, receivers, "Rate change broadcast");
            }
        }

        Ok(receivers)
    }

    fn flush_logged(&self, kind: BroadcastKind) {
        if let Err(e) = self.flush(kind) {
            warn!(error = %e, kind = kind.as_str(), "Broadcast failed");
        }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut rate_rx = self.state.rate_receiver();
        rate_rx.borrow_and_update();
        let mut rate_open = true;

        info!(
            interval_ms = self.coalescer.interval().as_millis() as u64,
            "Broadcaster started"
        );

        loop {
            let deadline = self.coalescer.deadline();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Broadcaster stopped");
                    break;
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.coalescer.fire(Instant::now()) {
                        self.flush_logged(BroadcastKind::Scheduled);
                    }
                }

                changed = rate_rx.changed(), if rate_open => {
                    if changed.is_err() {
                        debug!("Rate channel closed");
                        rate_open = false;
                        continue;
                    }
                    rate_rx.borrow_and_update();
                    if self.state.cache().is_empty() {
                        trace!("Rate changed with empty cache, nothing to push");
                        continue;
                    }
                    self.coalescer.clear_pending();
                    self.flush_logged(BroadcastKind::OutOfBand);
                }

                _ = self.signal.wait() => {
                    if let Some(at) = self.coalescer.signal(Instant::now()) {
                        trace!(?at, "Broadcast armed");
                    }
                }
            }
        }
    }
}
