use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// Jupiter Swap API v1
// Docs: https://dev.jup.ag/docs/swap-api/get-quote
pub const JUPITER_QUOTE_API: &str = "https://lite-api.jup.ag/swap/v1";

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const SOL_DECIMALS: i32 = 9;
const USDC_DECIMALS: i32 = 6;

type JupiterRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Settings for the Jupiter quote client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JupiterConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub rate_limit_rpm: u32,
    pub quote_amount: u64, // Lamports quoted per request (1 SOL)
    pub slippage_bps: u16, // 50 = 0.5%
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            base_url: JUPITER_QUOTE_API.to_string(),
            request_timeout_secs: 10,
            rate_limit_rpm: 60,
            quote_amount: 1_000_000_000,
            slippage_bps: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum JupiterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Jupiter API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("invalid quote: {0}")]
    InvalidQuote(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
}

/// Quote information from Jupiter
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: f64,            // Raw output per unit of input
    pub price_impact_pct: f64, // Price impact percentage
    pub in_amount: u64,
    pub out_amount: u64,
}

impl Quote {
    /// Price in whole output tokens per whole input token
    pub fn decimal_price(&self, input_decimals: i32, output_decimals: i32) -> f64 {
        let input = self.in_amount as f64 / 10f64.powi(input_decimals);
        let output = self.out_amount as f64 / 10f64.powi(output_decimals);
        output / input
    }
}

/// Client for the Jupiter aggregator quote API
///
/// Cloneable; all clones share one rate limiter.
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    config: JupiterConfig,
    rate_limiter: Arc<JupiterRateLimiter>,
}

impl JupiterClient {
    pub fn new(config: JupiterConfig) -> Result<Self, JupiterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let rpm = NonZeroU32::new(config.rate_limit_rpm).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    pub fn config(&self) -> &JupiterConfig {
        &self.config
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote, JupiterError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/quote", self.config.base_url);
        tracing::debug!(%url, input_mint, output_mint, amount, "Requesting Jupiter quote");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(JupiterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_quote(&body)
    }

    /// Current SOL/USDC price, rounded to 4 decimals
    pub async fn get_sol_usdc_price(&self) -> Result<f64, JupiterError> {
        let quote = self
            .get_quote(
                SOL_MINT,
                USDC_MINT,
                self.config.quote_amount,
                self.config.slippage_bps,
            )
            .await?;

        tracing::debug!(
            raw_price = quote.price,
            price_impact_pct = quote.price_impact_pct,
            "Jupiter quote received"
        );

        let price = quote.decimal_price(SOL_DECIMALS, USDC_DECIMALS);
        if !(price.is_finite() && price > 0.0) {
            return Err(JupiterError::InvalidQuote(format!(
                "non-positive price {} from {} -> {}",
                price, quote.in_amount, quote.out_amount
            )));
        }

        Ok((price * 10_000.0).round() / 10_000.0)
    }
}

fn parse_quote(body: &str) -> Result<Quote, JupiterError> {
    let response: QuoteResponse = serde_json::from_str(body)
        .map_err(|e| JupiterError::InvalidQuote(format!("{}: {}", e, body)))?;

    let in_amount: u64 = response
        .in_amount
        .parse()
        .map_err(|_| JupiterError::InvalidQuote(format!("inAmount {:?}", response.in_amount)))?;
    let out_amount: u64 = response
        .out_amount
        .parse()
        .map_err(|_| JupiterError::InvalidQuote(format!("outAmount {:?}", response.out_amount)))?;

    if in_amount == 0 {
        return Err(JupiterError::InvalidQuote("zero inAmount".to_string()));
    }

    let price_impact_pct = response
        .price_impact_pct
        .and_then(|p| p.parse().ok())
        .unwrap_or(0.0);

    Ok(Quote {
        price: out_amount as f64 / in_amount as f64,
        price_impact_pct,
        in_amount,
        out_amount,
    })
}
