use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::RollingBuffer;
use crate::metrics::TradingStats;
use crate::models::{ExitReason, Position, PriceSample, Side, Trade, TradeAction, Trend};
use crate::strategy::{detect_trend, ConfigError, ParameterUpdate, StrategyConfig};

/// Leveraged trend-following engine
///
/// Pure state machine over price ticks. Owns the trailing price window, the
/// single open position, the append-only trade ledger and the account
/// balance. Every mutator is all-or-nothing: a rejected open or close leaves
/// the state untouched.
///
/// Balance equation, holding after every call:
/// `balance = initial_balance - total_fees_paid + sum(trade.pnl)`
pub struct TrendFollowingEngine {
    config: StrategyConfig,
    window: RollingBuffer<PriceSample>,
    current_position: Option<Position>,
    completed_trades: Vec<Trade>,
    balance: f64,
    total_fees_paid: f64,
}

impl TrendFollowingEngine {
    pub fn new(config: StrategyConfig) -> Self {
        let window = RollingBuffer::new(config.max_window, config.trimmed_window);
        let balance = config.initial_balance;

        Self {
            config,
            window,
            current_position: None,
            completed_trades: Vec::new(),
            balance,
            total_fees_paid: 0.0,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn position(&self) -> Option<&Position> {
        self.current_position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.current_position.is_some()
    }

    /// Completed trades in the order they were closed
    pub fn trades(&self) -> &[Trade] {
        &self.completed_trades
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn total_fees_paid(&self) -> f64 {
        self.total_fees_paid
    }

    /// Add a price observation to the trailing window
    pub fn add_price(&mut self, timestamp: DateTime<Utc>, price: f64) {
        self.window.push(PriceSample { timestamp, price });
    }

    /// Detect a trend over the last `lookback_periods + 1` samples
    pub fn detect_trend(&self) -> Option<Trend> {
        let prices: Vec<f64> = self
            .window
            .recent(self.config.samples_needed())
            .iter()
            .map(|s| s.price)
            .collect();

        detect_trend(
            &prices,
            self.config.lookback_periods,
            self.config.min_trend_strength,
        )
    }

    /// Liquidation level for a position opened at `entry_price`
    ///
    /// distance = entry / leverage * liquidation_threshold
    pub fn calculate_liquidation_price(&self, entry_price: f64, side: Side) -> f64 {
        let liquidation_distance =
            entry_price / self.config.leverage * self.config.liquidation_threshold;

        match side {
            Side::Long => entry_price - liquidation_distance,
            Side::Short => entry_price + liquidation_distance,
        }
    }

    pub fn calculate_trading_fee(&self, notional_value: f64) -> f64 {
        notional_value * self.config.trading_fee_rate
    }

    /// Open a position at `price`
    ///
    /// Returns false without touching any state if a position is already
    /// open or the balance cannot cover the entry fee.
    pub fn open_position(&mut self, side: Side, price: f64, timestamp: DateTime<Utc>) -> bool {
        if let Some(existing) = &self.current_position {
            tracing::debug!(
                side = %side,
                open_side = %existing.side,
                "Open rejected: position already open"
            );
            return false;
        }

        let notional_value = self.config.position_size * self.config.leverage;
        let fee = self.calculate_trading_fee(notional_value);

        if self.balance < fee {
            tracing::warn!(
                "Insufficient balance for fees. Required: ${:.4}, Available: ${:.4}",
                fee,
                self.balance
            );
            return false;
        }

        self.balance -= fee;
        self.total_fees_paid += fee;

        let liquidation_price = self.calculate_liquidation_price(price, side);

        self.current_position = Some(Position {
            side,
            entry_price: price,
            size: self.config.position_size,
            leverage: self.config.leverage,
            entry_time: timestamp,
            liquidation_price,
        });

        tracing::info!(
            side = %side,
            fee,
            "Opened {} position at ${:.4}, liquidation at ${:.4}",
            side,
            price,
            liquidation_price
        );
        true
    }

    /// Close the open position at `price`
    ///
    /// The exit fee is charged on the position's own notional, so parameter
    /// updates made while it was open do not change what it pays.
    pub fn close_position(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<Trade> {
        let position = self.current_position.take()?;

        let gross_pnl = position.calculate_pnl(price);
        let fee = self.calculate_trading_fee(position.notional());
        self.balance -= fee;
        self.total_fees_paid += fee;

        // Net of the closing fee; this is what the ledger records
        let net_pnl = gross_pnl - fee;
        self.balance += net_pnl;

        let trade = Trade {
            id: Uuid::new_v4(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price: price,
            size: position.size,
            leverage: position.leverage,
            entry_time: position.entry_time,
            exit_time: timestamp,
            pnl: net_pnl,
            reason,
        };

        tracing::info!(
            side = %position.side,
            reason = %reason,
            fee,
            "Closed {} position at ${:.4}, PnL: ${:.2}",
            position.side,
            price,
            net_pnl
        );

        self.completed_trades.push(trade.clone());
        Some(trade)
    }

    /// Close the position if `price` crossed its liquidation level
    pub fn check_liquidation(&mut self, price: f64, timestamp: DateTime<Utc>) -> Option<Trade> {
        let liquidated = self
            .current_position
            .as_ref()
            .is_some_and(|p| p.is_liquidated(price));

        if !liquidated {
            return None;
        }

        tracing::warn!(price, "Liquidation level crossed");
        self.close_position(price, timestamp, ExitReason::Liquidation)
    }

    /// Process one price tick and make the trading decision
    ///
    /// Order: record price, liquidation check, trend detection, then either
    /// entry (when flat at tick start) or trend-reversal exit (when holding).
    pub fn process_price_update(
        &mut self,
        timestamp: DateTime<Utc>,
        price: f64,
    ) -> Option<TradeAction> {
        self.add_price(timestamp, price);

        if self.check_liquidation(price, timestamp).is_some() {
            return Some(TradeAction::Liquidated);
        }

        let trend = self.detect_trend();

        match self.current_position.as_ref().map(|p| p.side) {
            None => {
                let side = match trend? {
                    Trend::Bullish => Side::Long,
                    Trend::Bearish => Side::Short,
                };
                self.open_position(side, price, timestamp)
                    .then(|| TradeAction::opened(side))
            }
            Some(side) => {
                if trend == Some(side.opposing_trend()) {
                    self.close_position(price, timestamp, ExitReason::TrendReversal)
                        .map(|_| TradeAction::ClosedPosition)
                } else {
                    None
                }
            }
        }
    }

    /// Unrealized P&L of the open position (0 when flat)
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.current_position
            .as_ref()
            .map_or(0.0, |p| p.calculate_pnl(current_price))
    }

    pub fn realized_pnl(&self) -> f64 {
        self.completed_trades.iter().map(|t| t.pnl).sum()
    }

    pub fn win_rate(&self) -> f64 {
        self.stats().win_rate
    }

    pub fn stats(&self) -> TradingStats {
        TradingStats::from_trades(&self.completed_trades, self.total_fees_paid, self.balance)
    }

    /// Apply a partial parameter update
    ///
    /// Takes effect from the next tick. An open position keeps the leverage,
    /// size and liquidation price it was opened with.
    pub fn update_parameters(&mut self, update: &ParameterUpdate) -> Result<(), ConfigError> {
        update.validate()?;

        let mut next = self.config.clone();
        update.apply_to(&mut next);
        next.validate()?;

        self.config = next;
        tracing::info!(?update, "Strategy parameters updated");
        Ok(())
    }

    /// Clear the ledger and restore the starting balance
    ///
    /// Callers close any open position first so it is realized; a position
    /// still open here is discarded. The price window is kept.
    pub fn reset(&mut self) {
        if let Some(position) = self.current_position.take() {
            tracing::warn!(side = %position.side, "Reset discarded an unrealized position");
        }

        self.completed_trades.clear();
        self.balance = self.config.initial_balance;
        self.total_fees_paid = 0.0;
        tracing::info!("Strategy reset");
    }
}

impl Default for TrendFollowingEngine {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}
