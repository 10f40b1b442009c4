use crate::models::Trend;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the trend-following strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub lookback_periods: usize,
    pub min_trend_strength: f64, // Fraction of prior price each step must clear
    pub leverage: f64,
    pub position_size: f64,     // USDC posted per position, before leverage
    pub trading_fee_rate: f64,  // Charged on notional at open and at close
    pub liquidation_threshold: f64, // Fraction of (entry / leverage) before liquidation
    pub initial_balance: f64,
    // Price window memory policy
    pub max_window: usize,
    pub trimmed_window: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            lookback_periods: 3,
            min_trend_strength: 0.0005, // 0.05% minimum move per step
            leverage: 5.0,
            position_size: 100.0,
            trading_fee_rate: 0.001, // 0.1%
            liquidation_threshold: 0.8,
            initial_balance: 1000.0,
            max_window: 1000,
            trimmed_window: 500,
        }
    }
}

impl StrategyConfig {
    /// Number of samples trend detection looks at
    ///
    /// # Example
    /// ```
    /// use perpbot::strategy::signals::StrategyConfig;
    ///
    /// let config = StrategyConfig::default();
    /// assert_eq!(config.samples_needed(), 4);
    /// ```
    pub fn samples_needed(&self) -> usize {
        self.lookback_periods + 1
    }

    /// Check every tunable field, reporting the first bad one
    pub fn validate(&self) -> Result<(), ConfigError> {
        ParameterUpdate {
            leverage: Some(self.leverage),
            position_size: Some(self.position_size),
            lookback_periods: Some(self.lookback_periods),
            min_trend_strength: Some(self.min_trend_strength),
        }
        .validate()?;

        if !(self.trading_fee_rate >= 0.0 && self.trading_fee_rate < 1.0) {
            return Err(ConfigError::InvalidFeeRate(self.trading_fee_rate));
        }
        if !(self.liquidation_threshold > 0.0 && self.liquidation_threshold <= 1.0) {
            return Err(ConfigError::InvalidLiquidationThreshold(
                self.liquidation_threshold,
            ));
        }
        if self.trimmed_window < self.samples_needed() || self.trimmed_window > self.max_window {
            return Err(ConfigError::InvalidWindow {
                max: self.max_window,
                trimmed: self.trimmed_window,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("leverage must be positive, got {0}")]
    InvalidLeverage(f64),
    #[error("position size must be positive, got {0}")]
    InvalidPositionSize(f64),
    #[error("lookback periods must be at least 1")]
    InvalidLookback,
    #[error("min trend strength must be non-negative, got {0}")]
    InvalidTrendStrength(f64),
    #[error("fee rate must be in [0, 1), got {0}")]
    InvalidFeeRate(f64),
    #[error("liquidation threshold must be in (0, 1], got {0}")]
    InvalidLiquidationThreshold(f64),
    #[error("window trims to {trimmed} from {max}, which cannot hold the lookback")]
    InvalidWindow { max: usize, trimmed: usize },
}

/// Partial update of the tunable strategy parameters
///
/// Applied all-or-nothing: a single invalid field rejects the update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterUpdate {
    pub leverage: Option<f64>,
    pub position_size: Option<f64>,
    pub lookback_periods: Option<usize>,
    pub min_trend_strength: Option<f64>,
}

impl ParameterUpdate {
    pub fn is_empty(&self) -> bool {
        self.leverage.is_none()
            && self.position_size.is_none()
            && self.lookback_periods.is_none()
            && self.min_trend_strength.is_none()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(leverage) = self.leverage {
            if !(leverage > 0.0 && leverage.is_finite()) {
                return Err(ConfigError::InvalidLeverage(leverage));
            }
        }
        if let Some(size) = self.position_size {
            if !(size > 0.0 && size.is_finite()) {
                return Err(ConfigError::InvalidPositionSize(size));
            }
        }
        if self.lookback_periods == Some(0) {
            return Err(ConfigError::InvalidLookback);
        }
        if let Some(strength) = self.min_trend_strength {
            if !(strength >= 0.0 && strength.is_finite()) {
                return Err(ConfigError::InvalidTrendStrength(strength));
            }
        }
        Ok(())
    }

    /// Write the present fields into `config` (caller validates first)
    pub(crate) fn apply_to(&self, config: &mut StrategyConfig) {
        if let Some(leverage) = self.leverage {
            config.leverage = leverage;
        }
        if let Some(size) = self.position_size {
            config.position_size = size;
        }
        if let Some(lookback) = self.lookback_periods {
            config.lookback_periods = lookback;
        }
        if let Some(strength) = self.min_trend_strength {
            config.min_trend_strength = strength;
        }
    }
}

/// Detect a strict run of higher highs or lower lows
///
/// Looks at the last `lookback_periods + 1` prices (chronological). Every
/// step must move by more than `min_trend_strength` of the prior price.
/// Returns `None` when there is not enough data or no clean run.
pub fn detect_trend(prices: &[f64], lookback_periods: usize, min_trend_strength: f64) -> Option<Trend> {
    let needed = lookback_periods + 1;
    if lookback_periods == 0 || prices.len() < needed {
        return None;
    }

    let recent = &prices[prices.len() - needed..];

    let higher_highs = recent
        .windows(2)
        .all(|pair| pair[1] > pair[0] * (1.0 + min_trend_strength));
    if higher_highs {
        return Some(Trend::Bullish);
    }

    let lower_lows = recent
        .windows(2)
        .all(|pair| pair[1] < pair[0] * (1.0 - min_trend_strength));
    if lower_lows {
        return Some(Trend::Bearish);
    }

    None
}
