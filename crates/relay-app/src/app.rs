//! Main application orchestration.
//!
//! Startup order:
//! 1. Build every component from the validated configuration
//! 2. Bind the subscriber listener (fail fast)
//! 3. Fetch the conversion rate once
//! 4. Spawn rate poller, broadcaster, subscriber server and upstream connection
//! 5. Feed upstream frames into the cache until Ctrl-C or cancellation

use crate::config::AppConfig;
use crate::error::AppResult;
use relay_core::{SymbolUniverse, UpdateSignal};
use relay_feed::{PriceCache, TickIngestor};
use relay_fx::RateSource;
use relay_server::{AppState, Broadcaster, RelayState, SubscriberRegistry};
use relay_ws::ConnectionManager;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upstream frames buffered between the connection and the ingestor.
const FRAME_CHANNEL_CAPACITY: usize = 1024;

/// How long shutdown waits for each background task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Main application.
pub struct Application {
    config: AppConfig,
    universe: Arc<SymbolUniverse>,
    cache: Arc<PriceCache>,
    signal: UpdateSignal,
    registry: Arc<SubscriberRegistry>,
    rate_source: Arc<RateSource>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create a new application from a configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let universe = Arc::new(config.universe()?);
        let cache = Arc::new(PriceCache::new(universe.clone()));
        let registry = Arc::new(SubscriberRegistry::new(config.server.subscriber_queue));
        let rate_source = Arc::new(RateSource::new(config.rate_source_config())?);

        Ok(Self {
            config,
            universe,
            cache,
            signal: UpdateSignal::new(),
            registry,
            rate_source,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the configured port and run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let listener = relay_server::bind(&self.config.server).await?;
        self.run_with_listener(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run on an already bound listener until `stop` resolves or the shutdown
    /// token is cancelled.
    pub async fn run_with_listener<F>(self, listener: TcpListener, stop: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            symbols = ?self.universe.iter().map(|m| m.symbol.as_str()).collect::<Vec<_>>(),
            addr = %listener.local_addr()?,
            "Starting ticker relay"
        );

        // Best-effort rate before the first broadcast.
        if !self.rate_source.refresh().await {
            warn!(
                fallback = self.rate_source.current().value(),
                "Initial rate fetch failed, starting with fallback rate"
            );
        }

        // Upstream connection.
        let (frame_tx, mut frame_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);
        let manager = Arc::new(ConnectionManager::new(
            self.config.connection_config(&self.universe),
            frame_tx,
            self.shutdown.clone(),
        ));

        let state = RelayState::new(
            self.cache.clone(),
            self.rate_source.subscribe(),
            manager.subscribe_state(),
            self.registry.clone(),
            self.shutdown.clone(),
        );

        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        tasks.push((
            "rate_poller",
            tokio::spawn(self.rate_source.clone().run_poller(self.shutdown.clone())),
        ));

        let broadcaster = Broadcaster::new(
            state.clone(),
            self.signal.clone(),
            self.config.server.broadcast_interval(),
        );
        tasks.push((
            "broadcaster",
            tokio::spawn(broadcaster.run(self.shutdown.clone())),
        ));

        let app_state = AppState::new(state, &self.config.server);
        tasks.push((
            "server",
            tokio::spawn(async move {
                if let Err(e) = relay_server::serve(listener, app_state).await {
                    error!(error = %e, "Subscriber server exited with error");
                }
            }),
        ));

        let upstream = manager.clone();
        tasks.push((
            "upstream",
            tokio::spawn(async move {
                if let Err(e) = upstream.run().await {
                    error!(error = %e, "Upstream connection gave up");
                }
            }),
        ));

        let ingestor = TickIngestor::new(self.cache.clone(), self.signal.clone());

        info!("Entering main event loop");
        tokio::pin!(stop);

        loop {
            tokio::select! {
                frame = frame_rx.recv() => match frame {
                    Some(text) => {
                        ingestor.handle_text(&text);
                    }
                    None => {
                        debug!("Upstream frame channel closed");
                        break;
                    }
                },
                _ = &mut stop => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.shutdown.cancel();

        for (name, handle) in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => debug!(task = name, "Task stopped"),
                Ok(Err(e)) => warn!(task = name, error = %e, "Task panicked"),
                Err(_) => warn!(task = name, "Task did not stop in time"),
            }
        }

        let stats = ingestor.stats();
        info!(
            applied = stats.applied(),
            unknown = stats.unknown(),
            dropped = stats.dropped(),
            malformed = stats.malformed(),
            "Ticker relay stopped"
        );

        Ok(())
    }
}
