use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::api::{ApiError, Coin, QuoteSource, Quotes};
use crate::models::{Settings, DEFAULT_PRICE_POLL_INTERVAL_SECS};

/// Last known prices. A failed poll never clears them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceSnapshot {
    pub prices: Quotes,
    pub last_updated: Option<i64>,
    pub last_error: Option<String>,
}

impl PriceSnapshot {
    /// Take every finite, positive quote; returns how many were taken.
    pub fn merge(&mut self, quotes: Quotes, at_ms: i64) -> usize {
        let mut accepted = 0;
        for (coin, price) in quotes {
            if price.is_finite() && price > 0.0 {
                self.prices.insert(coin, price);
                accepted += 1;
            }
        }
        if accepted > 0 {
            self.last_updated = Some(at_ms);
        }
        self.last_error = None;
        accepted
    }

    pub fn price(&self, coin: Coin) -> Option<f64> {
        self.prices.get(&coin).copied()
    }
}

/// Polls a quote source on a fixed interval in the background
#[derive(Clone)]
pub struct PriceTicker {
    source: Arc<dyn QuoteSource>,
    coins: Vec<Coin>,
    interval: Duration,
    snapshot: Arc<RwLock<PriceSnapshot>>,
    task: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl PriceTicker {
    pub fn new(source: Arc<dyn QuoteSource>, interval: Duration) -> Self {
        Self {
            source,
            coins: Coin::ALL.to_vec(),
            interval,
            snapshot: Arc::new(RwLock::new(PriceSnapshot::default())),
            task: Arc::new(RwLock::new(None)),
        }
    }

    /// Ticker polling at the interval stored in settings
    pub fn from_settings(source: Arc<dyn QuoteSource>, settings: &Settings) -> Self {
        let secs = if settings.price_poll_interval_secs >= 1 {
            settings.price_poll_interval_secs
        } else {
            DEFAULT_PRICE_POLL_INTERVAL_SECS
        };
        Self::new(source, Duration::from_secs(secs as u64))
    }

    pub fn with_coins(mut self, coins: &[Coin]) -> Self {
        self.coins = coins.to_vec();
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. A ticker that is already running is restarted.
    pub async fn start(&self) {
        self.stop().await;

        log::info!(
            "Starting price ticker ({}) - interval: {:?}",
            self.source.source_name(),
            self.interval
        );

        let source = self.source.clone();
        let coins = self.coins.clone();
        let snapshot = self.snapshot.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                // Errors are already recorded on the snapshot
                let _ = Self::poll(source.as_ref(), &coins, &snapshot).await;
            }
        });

        *self.task.write().await = Some(handle);
    }

    /// Poll once, outside the schedule
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        Self::poll(self.source.as_ref(), &self.coins, &self.snapshot).await
    }

    async fn poll(
        source: &dyn QuoteSource,
        coins: &[Coin],
        snapshot: &RwLock<PriceSnapshot>,
    ) -> Result<usize, ApiError> {
        match source.fetch_quotes(coins).await {
            Ok(quotes) => {
                let accepted = snapshot
                    .write()
                    .await
                    .merge(quotes, Utc::now().timestamp_millis());
                log::debug!("Price tick from {}: {} quotes", source.source_name(), accepted);
                Ok(accepted)
            }
            Err(e) => {
                log::warn!("Price fetch from {} failed: {}", source.source_name(), e);
                snapshot.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn snapshot(&self) -> PriceSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .read()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.task.write().await.take() {
            handle.abort();
            log::info!("Price ticker stopped");
        }
    }
}
