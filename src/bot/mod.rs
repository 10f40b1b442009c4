// Bot coordinator: drives the engine from a price feed
pub mod coordinator;
pub mod status;

pub use coordinator::TradingBot;
pub use status::{BotStatus, IterationOutcome};

use crate::feed::FeedError;
use crate::strategy::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Runtime settings for the coordinator loop
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub update_interval: Duration,
    pub max_errors: u32, // Consecutive hard failures before halting
    pub error_backoff_cap: Duration,
    pub fetch_timeout: Duration,
    pub stop_grace: Duration,
    pub price_history_cap: usize,
    pub price_history_trim: usize,
    pub activity_log_cap: usize,
    pub activity_log_trim: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            max_errors: 10,
            error_backoff_cap: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
            price_history_cap: 1000,
            price_history_trim: 500,
            activity_log_cap: 100,
            activity_log_trim: 50,
        }
    }
}

impl BotConfig {
    /// Wait after a failed iteration
    pub fn error_backoff(&self) -> Duration {
        self.update_interval.min(self.error_backoff_cap)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BotError {
    #[error("price feed failure: {0}")]
    Feed(#[from] FeedError),
    #[error("feed returned unusable price {0}")]
    InvalidPrice(f64),
    #[error("invalid parameters: {0}")]
    Config(#[from] ConfigError),
    #[error("price loop did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}
