use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use perpbot::api::JupiterClient;
use perpbot::feed::{JupiterPriceFeed, SyntheticPriceFeed};
use perpbot::metrics::PnlPoint;
use perpbot::{AppConfig, ParameterUpdate, Result, Trade, TradingBot, TradingStats};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "perpbot", version, about = "Leveraged SOL perp trend-following bot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Paper-trade against live Jupiter quotes until Ctrl+C
    Run {
        /// Seconds between price fetches
        #[arg(long)]
        interval: Option<u64>,
        #[arg(long)]
        leverage: Option<f64>,
        /// Margin per position in USD
        #[arg(long)]
        position_size: Option<f64>,
    },
    /// Drive the engine with a seeded synthetic price walk
    Simulate {
        #[arg(long, default_value_t = 500)]
        ticks: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Print stats, trades and the PnL curve as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SimulationReport {
    stats: TradingStats,
    trades: Vec<Trade>,
    pnl_curve: Vec<PnlPoint>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut app = AppConfig::load()?;

    match cli.command {
        Command::Run {
            interval,
            leverage,
            position_size,
        } => {
            if let Some(secs) = interval {
                app.bot.update_interval_secs = secs;
            }
            let overrides = ParameterUpdate {
                leverage,
                position_size,
                ..Default::default()
            };
            overrides.validate()?;
            if let Some(leverage) = overrides.leverage {
                app.strategy.leverage = leverage;
            }
            if let Some(size) = overrides.position_size {
                app.strategy.position_size = size;
            }
            app.validate()?;
            run_live(app).await
        }
        Command::Simulate { ticks, seed, json } => simulate(app, ticks, seed, json),
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perpbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_live(app: AppConfig) -> Result<()> {
    tracing::info!("🚀 PerpBot starting - SOL trend following");

    let bot_config = app.bot.to_bot_config();
    let strategy = app.strategy.clone();

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Leverage: {:.1}x", strategy.leverage);
    tracing::info!("  Position Size: ${:.2}", strategy.position_size);
    tracing::info!("  Lookback: {} periods", strategy.lookback_periods);
    tracing::info!("  Min Trend Strength: {:.3}%", strategy.min_trend_strength * 100.0);
    tracing::info!("  Initial Balance: ${:.2}", strategy.initial_balance);
    tracing::info!("  Update Interval: {:?}", bot_config.update_interval);

    let client = JupiterClient::new(app.jupiter.clone())?;
    let feed = JupiterPriceFeed::new(client, app.retry.clone());
    let bot = TradingBot::new(bot_config.clone(), strategy, feed);

    bot.start();
    tracing::info!("\nPress Ctrl+C to stop...\n");

    let mut ticker = interval(bot_config.update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately, before the loop has a price
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                let status = bot.status();
                tracing::info!("📈 {}", status.summary());
                if !status.is_running {
                    tracing::error!("Price loop halted after {} consecutive errors", status.error_count);
                    break;
                }
            }
        }
    }

    if let Err(e) = bot.stop().await {
        tracing::error!("Shutdown incomplete: {}", e);
    }

    bot.stats().print_report();
    Ok(())
}

fn simulate(app: AppConfig, ticks: usize, seed: u64, json: bool) -> Result<()> {
    let bot_config = app.bot.to_bot_config();
    let step = ChronoDuration::seconds(app.bot.update_interval_secs as i64);
    let feed = SyntheticPriceFeed::new(seed, app.synthetic.clone());
    let bot = TradingBot::new(bot_config, app.strategy.clone(), feed);

    tracing::info!(ticks, seed, "🧪 Running synthetic simulation");

    let start = Utc::now() - step * ticks as i32;
    let mut skipped = 0usize;

    for i in 0..ticks {
        match bot.feed().next_price() {
            Ok(price) => {
                bot.process_sample(start + step * i as i32, price);
            }
            Err(e) => {
                tracing::debug!(tick = i, "Skipped tick: {}", e);
                skipped += 1;
            }
        }
    }

    let report = SimulationReport {
        stats: bot.stats(),
        trades: bot.completed_trades(),
        pnl_curve: bot.pnl_curve(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n🧪 Simulated {} ticks (seed {}, {} skipped)", ticks, seed, skipped);
    println!("{}", bot.status().summary());
    report.stats.print_report();

    let shown = report.trades.len().saturating_sub(10);
    for trade in &report.trades[shown..] {
        println!(
            "  {} {} ${:.4} -> ${:.4} | PnL ${:>8.2} | {}m",
            trade.reason,
            trade.side,
            trade.entry_price,
            trade.exit_price,
            trade.pnl,
            trade.holding_period_minutes()
        );
    }

    Ok(())
}
