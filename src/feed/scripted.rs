use super::{FeedError, PriceFeed};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays a fixed sequence of fetch outcomes
///
/// Once the script runs out every call reports the feed unavailable.
pub struct ScriptedPriceFeed {
    script: Mutex<VecDeque<Result<f64, FeedError>>>,
    delay: Option<Duration>,
    token: String,
}

impl ScriptedPriceFeed {
    pub fn new(outcomes: impl IntoIterator<Item = Result<f64, FeedError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            delay: None,
            token: "SOL".to_string(),
        }
    }

    /// Replay plain prices
    pub fn from_prices(prices: &[f64]) -> Self {
        Self::new(prices.iter().map(|&p| Ok(p)))
    }

    /// Sleep this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl PriceFeed for ScriptedPriceFeed {
    async fn get_price(&self) -> Result<f64, FeedError> {
        let next = self
            .script
            .lock()
            .map_err(|_| FeedError::InvalidQuote("script poisoned".to_string()))?
            .pop_front();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        next.unwrap_or_else(|| {
            Err(FeedError::Unavailable {
                attempts: 1,
                reason: "script exhausted".to_string(),
            })
        })
    }

    fn token(&self) -> &str {
        &self.token
    }
}
