use crate::feed::FeedError;
use crate::models::{PositionSnapshot, TradeAction};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of the coordinator for the presentation layer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BotStatus {
    pub is_running: bool,
    pub last_price: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    pub error_count: u32,
    pub price_history_count: usize,
    pub activity_log_count: usize,
    pub current_position: Option<PositionSnapshot>,
}

impl BotStatus {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let price = self
            .last_price
            .map_or_else(|| "N/A".to_string(), |p| format!("${:.4}", p));

        match &self.current_position {
            Some(pos) => format!(
                "SOL {} | {} {:.1}x @ ${:.4} | uPnL ${:.2} | liq ${:.4} ({:.1}% away)",
                price,
                pos.side,
                pos.leverage,
                pos.entry_price,
                pos.unrealized_pnl,
                pos.liquidation_price,
                pos.distance_to_liquidation_pct
            ),
            None => format!("SOL {} | flat | {} samples", price, self.price_history_count),
        }
    }
}

/// Result of one fetch-and-process iteration
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Feed had no price this time; nothing changed
    Skipped(FeedError),
    Processed {
        price: f64,
        timestamp: DateTime<Utc>,
        action: Option<TradeAction>,
    },
}
