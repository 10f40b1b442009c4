use super::{FeedError, PriceFeed, RetryPolicy};
use crate::api::JupiterClient;
use tokio::time::sleep;

/// SOL/USDC price feed backed by Jupiter quotes
///
/// Retries any client failure up to the policy's attempt count with a fixed
/// delay, malformed quotes included. Exhausting the attempts is a soft
/// `Unavailable` failure.
#[derive(Clone)]
pub struct JupiterPriceFeed {
    client: JupiterClient,
    retry: RetryPolicy,
}

impl JupiterPriceFeed {
    pub fn new(client: JupiterClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

impl PriceFeed for JupiterPriceFeed {
    async fn get_price(&self) -> Result<f64, FeedError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.client.get_sol_usdc_price().await {
                Ok(price) => {
                    if attempt > 1 {
                        tracing::info!("✓ Fetched SOL price after {} attempts", attempt);
                    }
                    return Ok(price);
                }
                Err(e) => {
                    last_error = e.to_string();

                    if attempt < max_attempts {
                        tracing::warn!(
                            "Attempt {}/{} failed: {}. Retrying in {}ms...",
                            attempt,
                            max_attempts,
                            last_error,
                            self.retry.retry_delay_ms
                        );
                        sleep(self.retry.retry_delay()).await;
                    }
                }
            }
        }

        Err(FeedError::Unavailable {
            attempts: max_attempts,
            reason: last_error,
        })
    }

    fn token(&self) -> &str {
        "SOL"
    }
}
