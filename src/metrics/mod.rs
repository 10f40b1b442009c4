use crate::models::Trade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Performance statistics derived from the trade ledger
///
/// Everything except `total_fees` and `current_balance` is recomputed from
/// the trades on every call; those two are reported as the engine tracks them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub realized_pnl: f64,
    pub win_rate: f64, // Percentage, 0 when there are no trades
    pub avg_trade: f64,
    pub avg_win: f64,
    pub avg_loss: f64, // Negative (mean of losing trades)
    pub largest_win: f64,
    pub largest_loss: f64,
    /// |avg_win / avg_loss|; `None` when there is no loss to divide by
    pub profit_factor: Option<f64>,
    pub total_fees: f64,
    pub current_balance: f64,
}

impl TradingStats {
    pub fn from_trades(trades: &[Trade], total_fees: f64, current_balance: f64) -> Self {
        let total_trades = trades.len();
        let realized_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|&p| p < 0.0).collect();

        let win_rate = if total_trades > 0 {
            (wins.len() as f64 / total_trades as f64) * 100.0
        } else {
            0.0
        };
        let avg_trade = if total_trades > 0 {
            realized_pnl / total_trades as f64
        } else {
            0.0
        };

        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        let profit_factor = if avg_loss != 0.0 {
            Some((avg_win / avg_loss).abs())
        } else {
            None
        };

        Self {
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            realized_pnl,
            win_rate,
            avg_trade,
            avg_win,
            avg_loss,
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
            profit_factor,
            total_fees,
            current_balance,
        }
    }

    /// Print a summary table
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               TRADING STATISTICS                      ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("💰 Account:");
        println!("  Balance:          ${:.2}", self.current_balance);
        println!("  Realized P&L:     ${:.2}", self.realized_pnl);
        println!("  Total Fees:       ${:.2}", self.total_fees);

        println!("\n📊 Trades:");
        println!("  Total:            {}", self.total_trades);
        println!(
            "  Wins / Losses:    {} / {}",
            self.winning_trades, self.losing_trades
        );
        println!("  Win Rate:         {:.1}%", self.win_rate);

        if self.total_trades > 0 {
            println!("\n📈 Distribution:");
            println!("  Avg Trade:        ${:.2}", self.avg_trade);
            println!("  Avg Win:          ${:.2}", self.avg_win);
            println!("  Avg Loss:         ${:.2}", self.avg_loss);
            println!("  Largest Win:      ${:.2}", self.largest_win);
            println!("  Largest Loss:     ${:.2}", self.largest_loss);
            match self.profit_factor {
                Some(pf) => println!("  Profit Factor:    {:.2}", pf),
                None => println!("  Profit Factor:    ∞"),
            }
        }
        println!();
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// One point on the realized P&L curve
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PnlPoint {
    pub exit_time: DateTime<Utc>,
    pub trade_pnl: f64,
    pub cumulative_pnl: f64,
}

/// Per-trade and cumulative realized P&L, in ledger order
pub fn pnl_curve(trades: &[Trade]) -> Vec<PnlPoint> {
    let mut cumulative_pnl = 0.0;
    trades
        .iter()
        .map(|trade| {
            cumulative_pnl += trade.pnl;
            PnlPoint {
                exit_time: trade.exit_time,
                trade_pnl: trade.pnl,
                cumulative_pnl,
            }
        })
        .collect()
}
