//! Application configuration.

use crate::error::{AppError, AppResult};
use relay_core::{Rate, SymbolMeta, SymbolUniverse};
use relay_fx::RateSourceConfig;
use relay_server::ServerConfig;
use relay_ws::{ConnectionConfig, ReconnectPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Reconnect delay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay after every disconnect.
    #[default]
    Fixed,
    /// Doubling delay capped at `reconnect_max_delay_ms`.
    Exponential,
}

/// Upstream ticker feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Combined-stream endpoint; the `?streams=` query is appended.
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Exponential backoff only.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// 0 disables the idle watchdog.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_upstream_url() -> String {
    "wss://stream.binance.com:9443/stream".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            backoff: BackoffKind::default(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        match self.backoff {
            BackoffKind::Fixed => ReconnectPolicy::Fixed {
                delay_ms: self.reconnect_delay_ms,
            },
            BackoffKind::Exponential => ReconnectPolicy::Exponential {
                base_ms: self.reconnect_delay_ms,
                max_ms: self.reconnect_max_delay_ms,
            },
        }
    }
}

/// Conversion rate source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxConfig {
    #[serde(default = "default_fx_url")]
    pub url: String,
    /// Key read from the response's `rates` object.
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Rate used until the first successful fetch.
    #[serde(default = "default_fallback_rate")]
    pub fallback_rate: f64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_fx_url() -> String {
    "https://api.frankfurter.app/latest?from=USD&to=INR".to_string()
}

fn default_quote_currency() -> String {
    "INR".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_fallback_rate() -> f64 {
    86.0
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            url: default_fx_url(),
            quote_currency: default_quote_currency(),
            poll_interval_secs: default_poll_interval_secs(),
            fallback_rate: default_fallback_rate(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub fx: FxConfig,
    /// Tracked instruments in output order.
    #[serde(default = "SymbolUniverse::default_symbols")]
    pub symbols: Vec<SymbolMeta>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            fx: FxConfig::default(),
            symbols: SymbolUniverse::default_symbols(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.symbols.is_empty() {
            return Err(AppError::Config("at least one symbol is required".to_string()));
        }

        let mut seen = HashSet::new();
        for meta in &self.symbols {
            if !seen.insert(meta.stream_id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate stream_id: {}",
                    meta.stream_id
                )));
            }
        }

        if self.server.broadcast_interval_ms == 0 {
            return Err(AppError::Config(
                "server.broadcast_interval_ms must be > 0".to_string(),
            ));
        }
        if self.upstream.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "upstream.reconnect_delay_ms must be > 0".to_string(),
            ));
        }
        if Rate::validate(self.fx.fallback_rate).is_err() {
            return Err(AppError::Config(format!(
                "fx.fallback_rate must be finite and > 0, got {}",
                self.fx.fallback_rate
            )));
        }
        if self.fx.poll_interval_secs == 0 {
            return Err(AppError::Config(
                "fx.poll_interval_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The tracked universe, validated.
    pub fn universe(&self) -> AppResult<SymbolUniverse> {
        Ok(SymbolUniverse::new(self.symbols.clone())?)
    }

    /// Upstream connection settings for `universe`.
    pub fn connection_config(&self, universe: &SymbolUniverse) -> ConnectionConfig {
        ConnectionConfig {
            url: universe.combined_stream_url(&self.upstream.url),
            reconnect: self.upstream.reconnect_policy(),
            idle_timeout_ms: self.upstream.idle_timeout_ms,
            ..ConnectionConfig::default()
        }
    }

    pub fn rate_source_config(&self) -> RateSourceConfig {
        RateSourceConfig {
            url: self.fx.url.clone(),
            quote_currency: self.fx.quote_currency.clone(),
            fallback_rate: self.fx.fallback_rate,
            poll_interval: Duration::from_secs(self.fx.poll_interval_secs),
            request_timeout: Duration::from_millis(self.fx.request_timeout_ms),
        }
    }
}
