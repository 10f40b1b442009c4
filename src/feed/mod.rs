// Price feed collaborators for the bot coordinator
pub mod jupiter;
pub mod scripted;
pub mod synthetic;

pub use jupiter::JupiterPriceFeed;
pub use scripted::ScriptedPriceFeed;
pub use synthetic::{SyntheticConfig, SyntheticPriceFeed};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Why a price could not be produced
///
/// Soft failures (`Unavailable`, `Timeout`) make the coordinator skip the
/// tick. Hard failures count toward its consecutive-error ceiling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("price unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },
    #[error("price fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid price data: {0}")]
    InvalidQuote(String),
}

impl FeedError {
    pub fn is_soft(&self) -> bool {
        matches!(self, FeedError::Unavailable { .. } | FeedError::Timeout(_))
    }
}

/// Source of timestamp-free spot prices
///
/// Implementations own their retry policy; one call is one logical fetch.
pub trait PriceFeed: Send + Sync + 'static {
    fn get_price(&self) -> impl Future<Output = Result<f64, FeedError>> + Send;

    /// Symbol recorded in price history
    fn token(&self) -> &str;
}

/// Bounded retry settings for a feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl RetryPolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}
