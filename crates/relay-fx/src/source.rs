//! HTTP rate poller.
//!
//! Response format: `{"amount": 1.0, "base": "USD", "rates": {"INR": 83.12}}`.
//! Anything else, or a non-2xx status, is a failed fetch; the previous rate
//! is kept and the failure is only logged.

use crate::error::{FxError, FxResult};
use chrono::Utc;
use relay_core::Rate;
use relay_telemetry::Metrics;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Rate source settings.
#[derive(Debug, Clone)]
pub struct RateSourceConfig {
    pub url: String,
    /// Key looked up under `rates` (e.g. "INR").
    pub quote_currency: String,
    /// Used until the first successful fetch.
    pub fallback_rate: f64,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for RateSourceConfig {
    fn default() -> Self {
        Self {
            url: "https://api.frankfurter.app/latest?from=USD&to=INR".to_string(),
            quote_currency: "INR".to_string(),
            fallback_rate: 86.0,
            poll_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Owner and single writer of the process-wide rate.
pub struct RateSource {
    client: Client,
    config: RateSourceConfig,
    rate_tx: watch::Sender<Rate>,
}

impl RateSource {
    pub fn new(config: RateSourceConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FxError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        let (rate_tx, _) = watch::channel(Rate::fallback(config.fallback_rate)?);

        Ok(Self {
            client,
            config,
            rate_tx,
        })
    }

    /// Fetch the rate without storing it.
    pub async fn fetch_once(&self) -> FxResult<f64> {
        debug!(url = %self.config.url, "Fetching conversion rate");

        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| FxError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FxError::UnexpectedShape(format!("Failed to parse response: {e}")))?;

        let value = body
            .get("rates")
            .and_then(|rates| rates.get(&self.config.quote_currency))
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                FxError::UnexpectedShape(format!(
                    "no numeric rates.{} in response",
                    self.config.quote_currency
                ))
            })?;

        Rate::validate(value)?;
        Ok(value)
    }

    /// Fetch and store. Returns whether the stored rate was replaced.
    ///
    /// On failure the previous rate stays untouched.
    pub async fn refresh(&self) -> bool {
        match self.fetch_once().await {
            Ok(value) => match self.store(value) {
                Ok(()) => {
                    Metrics::fx_fetch_ok(value);
                    info!(
                        quote = %self.config.quote_currency,
                        rate = value,
                        "Conversion rate updated"
                    );
                    true
                }
                Err(e) => {
                    Metrics::fx_fetch_error();
                    warn!(error = %e, "Rejected conversion rate");
                    false
                }
            },
            Err(e) => {
                Metrics::fx_fetch_error();
                warn!(
                    error = %e,
                    cached = self.current().value(),
                    "Conversion rate fetch failed, keeping cached rate"
                );
                false
            }
        }
    }

    /// Replace the stored rate and notify subscribers.
    pub fn store(&self, value: f64) -> FxResult<()> {
        let rate = Rate::fetched(value, Utc::now())?;
        self.rate_tx.send_replace(rate);
        Ok(())
    }

    pub fn current(&self) -> Rate {
        *self.rate_tx.borrow()
    }

    /// Receiver that observes every successful refresh.
    pub fn subscribe(&self) -> watch::Receiver<Rate> {
        self.rate_tx.subscribe()
    }

    /// Refresh every `poll_interval` until cancelled.
    ///
    /// The first refresh happens one interval after the call; the startup
    /// fetch is the caller's job.
    pub async fn run_poller(self: Arc<Self>, shutdown: CancellationToken) {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = period.as_secs(), "Rate poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Rate poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_fallback() {
        let source = RateSource::new(RateSourceConfig::default()).unwrap();
        let rate = source.current();
        assert_eq!(rate.value(), 86.0);
        assert!(rate.last_updated().is_none());
    }

    #[test]
    fn test_invalid_fallback_rejected() {
        let config = RateSourceConfig {
            fallback_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            RateSource::new(config),
            Err(FxError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_store_notifies_subscribers() {
        let source = RateSource::new(RateSourceConfig::default()).unwrap();
        let mut rx = source.subscribe();
        assert!(!rx.has_changed().unwrap());

        source.store(83.5).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().value(), 83.5);
        assert!(source.current().last_updated().is_some());

        assert!(source.store(f64::NAN).is_err());
        assert_eq!(source.current().value(), 83.5);
    }
}
