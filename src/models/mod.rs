use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Direction of a leveraged position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// The trend that signals an exit for this side
    pub fn opposing_trend(&self) -> Trend {
        match self {
            Side::Long => Trend::Bearish,
            Side::Short => Trend::Bullish,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Directional signal from the trailing price window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TrendReversal,
    Liquidation,
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TrendReversal => write!(f, "trend_reversal"),
            ExitReason::Liquidation => write!(f, "liquidation"),
            ExitReason::Manual => write!(f, "manual"),
        }
    }
}

/// Action reported for a tick or a manual command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    OpenedLong,
    OpenedShort,
    ClosedPosition,
    Liquidated,
    ManualClose,
}

impl TradeAction {
    pub fn opened(side: Side) -> Self {
        match side {
            Side::Long => TradeAction::OpenedLong,
            Side::Short => TradeAction::OpenedShort,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            TradeAction::OpenedLong => "opened_long",
            TradeAction::OpenedShort => "opened_short",
            TradeAction::ClosedPosition => "closed_position",
            TradeAction::Liquidated => "liquidated",
            TradeAction::ManualClose => "manual_close",
        };
        write!(f, "{}", tag)
    }
}

/// The single open leveraged position
///
/// `size` is the posted amount in USDC before leverage. The liquidation
/// price is fixed when the position is opened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub leverage: f64,
    pub entry_time: DateTime<Utc>,
    pub liquidation_price: f64,
}

impl Position {
    /// Unrealized P&L at `current_price`
    pub fn calculate_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            Side::Long => (current_price - self.entry_price) * self.size * self.leverage,
            Side::Short => (self.entry_price - current_price) * self.size * self.leverage,
        }
    }

    pub fn is_liquidated(&self, current_price: f64) -> bool {
        match self.side {
            Side::Long => current_price <= self.liquidation_price,
            Side::Short => current_price >= self.liquidation_price,
        }
    }

    /// Exposure used for fee calculation (size x leverage)
    pub fn notional(&self) -> f64 {
        self.size * self.leverage
    }
}

/// Completed trade. `pnl` is net of the closing fee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub id: Uuid,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub leverage: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub reason: ExitReason,
}

impl Trade {
    pub fn holding_period_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// A single observation in the engine's trailing window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Simple price snapshot - just price and timestamp
/// This is what the coordinator keeps in its price history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSnapshot {
    pub token: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Position metadata captured when an action is logged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSnapshot {
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub leverage: f64,
    pub entry_time: DateTime<Utc>,
    pub liquidation_price: f64,
    pub unrealized_pnl: f64,
    /// Distance between mark and liquidation, as % of mark
    pub distance_to_liquidation_pct: f64,
    pub age_minutes: i64,
}

impl PositionSnapshot {
    pub fn capture(position: &Position, mark_price: f64, now: DateTime<Utc>) -> Self {
        let distance_to_liquidation_pct = if mark_price > 0.0 {
            (mark_price - position.liquidation_price).abs() / mark_price * 100.0
        } else {
            0.0
        };

        Self {
            side: position.side,
            entry_price: position.entry_price,
            size: position.size,
            leverage: position.leverage,
            entry_time: position.entry_time,
            liquidation_price: position.liquidation_price,
            unrealized_pnl: position.calculate_pnl(mark_price),
            distance_to_liquidation_pct,
            age_minutes: (now - position.entry_time).num_minutes(),
        }
    }
}

/// Entry in the coordinator's activity log (observational only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    pub price: f64,
    pub position: Option<PositionSnapshot>,
}
