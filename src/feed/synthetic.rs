use super::{FeedError, PriceFeed};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Random walk parameters for the synthetic feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyntheticConfig {
    pub start_price: f64,
    pub drift: f64,      // Mean move per tick, as a fraction of price
    pub volatility: f64, // Uniform noise half-width per tick, as a fraction
    pub failure_rate: f64, // Probability a tick reports the feed unavailable
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start_price: 150.0,
            drift: 0.0,
            volatility: 0.004, // ±0.4% per tick
            failure_rate: 0.0,
        }
    }
}

struct WalkState {
    rng: StdRng,
    price: f64,
}

/// Generates a seeded random-walk SOL price for offline simulation
pub struct SyntheticPriceFeed {
    config: SyntheticConfig,
    state: Mutex<WalkState>,
}

impl SyntheticPriceFeed {
    /// Create a new feed with a seed for reproducibility
    pub fn new(seed: u64, config: SyntheticConfig) -> Self {
        let state = WalkState {
            rng: StdRng::seed_from_u64(seed),
            price: config.start_price,
        };

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Advance the walk one tick
    pub fn next_price(&self) -> Result<f64, FeedError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| FeedError::InvalidQuote("synthetic feed state poisoned".to_string()))?;

        if self.config.failure_rate > 0.0 && state.rng.gen_bool(self.config.failure_rate.min(1.0)) {
            return Err(FeedError::Unavailable {
                attempts: 1,
                reason: "simulated outage".to_string(),
            });
        }

        let noise = if self.config.volatility > 0.0 {
            state
                .rng
                .gen_range(-self.config.volatility..self.config.volatility)
        } else {
            0.0
        };
        let next = state.price * (1.0 + self.config.drift + noise);
        state.price = next.max(0.01);

        Ok((state.price * 10_000.0).round() / 10_000.0)
    }
}

impl PriceFeed for SyntheticPriceFeed {
    async fn get_price(&self) -> Result<f64, FeedError> {
        self.next_price()
    }

    fn token(&self) -> &str {
        "SOL"
    }
}
