use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::{BotConfig, BotError, BotStatus, IterationOutcome};
use crate::execution::{RollingBuffer, TrendFollowingEngine};
use crate::feed::{FeedError, PriceFeed};
use crate::metrics::{pnl_curve, PnlPoint, TradingStats};
use crate::models::{ActivityEntry, PositionSnapshot, PriceSnapshot, Side, Trade, TradeAction, ExitReason};
use crate::strategy::{ParameterUpdate, StrategyConfig};

/// Everything a tick or a manual command mutates, behind one lock
struct BotState {
    engine: TrendFollowingEngine,
    price_history: RollingBuffer<PriceSnapshot>,
    activity_log: RollingBuffer<ActivityEntry>,
    last_price: Option<f64>,
    last_update: Option<DateTime<Utc>>,
}

impl BotState {
    fn record_activity(&mut self, action: TradeAction, price: f64, timestamp: DateTime<Utc>) {
        let position = self
            .engine
            .position()
            .map(|p| PositionSnapshot::capture(p, price, timestamp));

        self.activity_log.push(ActivityEntry {
            timestamp,
            action,
            price,
            position,
        });

        tracing::info!(action = %action, "Trading action: {} at ${:.4}", action, price);
    }

    fn record_sample(
        &mut self,
        token: &str,
        timestamp: DateTime<Utc>,
        price: f64,
    ) -> Option<TradeAction> {
        self.price_history.push(PriceSnapshot {
            token: token.to_string(),
            price,
            timestamp,
        });

        let action = self.engine.process_price_update(timestamp, price);
        if let Some(action) = action {
            self.record_activity(action, price, timestamp);
        }

        self.last_price = Some(price);
        self.last_update = Some(timestamp);
        action
    }

    fn manual_close(&mut self) -> Option<Trade> {
        let side = match self.engine.position() {
            Some(position) => position.side,
            None => {
                tracing::warn!("Manual close failed: No current position");
                return None;
            }
        };
        let Some(price) = self.last_price else {
            tracing::warn!("Manual close failed: No price data available");
            return None;
        };

        tracing::info!(
            "Manual close requested for {} position at ${:.4}",
            side,
            price
        );

        let now = Utc::now();
        let trade = self.engine.close_position(price, now, ExitReason::Manual)?;
        self.record_activity(TradeAction::ManualClose, price, now);
        tracing::info!("Manual close successful: PnL ${:.2}", trade.pnl);
        Some(trade)
    }
}

struct BotInner<F> {
    config: BotConfig,
    feed: F,
    state: Mutex<BotState>,
    running: AtomicBool,
    error_count: AtomicU32,
    // Bumped on every start so a superseded loop knows to exit
    generation: AtomicU64,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<F: PriceFeed> BotInner<F> {
    fn lock_state(&self) -> MutexGuard<'_, BotState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Bot state lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Fetch one price and feed it through the engine
    ///
    /// Leaves the error counter alone; the loop owns it.
    async fn run_iteration(&self) -> Result<IterationOutcome, BotError> {
        let fetched = match timeout(self.config.fetch_timeout, self.feed.get_price()).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(self.config.fetch_timeout)),
        };

        let price = match fetched {
            Ok(price) => price,
            Err(e) if e.is_soft() => {
                tracing::warn!("Failed to fetch price: {}", e);
                return Ok(IterationOutcome::Skipped(e));
            }
            Err(e) => return Err(BotError::Feed(e)),
        };

        if !(price.is_finite() && price > 0.0) {
            return Err(BotError::InvalidPrice(price));
        }

        // Stamped under the lock so concurrent fetches stay in order
        let (timestamp, action) = {
            let mut state = self.lock_state();
            let timestamp = Utc::now();
            let action = state.record_sample(self.feed.token(), timestamp, price);
            (timestamp, action)
        };

        Ok(IterationOutcome::Processed {
            price,
            timestamp,
            action,
        })
    }

    fn process_sample(&self, timestamp: DateTime<Utc>, price: f64) -> Option<TradeAction> {
        self.lock_state()
            .record_sample(self.feed.token(), timestamp, price)
    }
}

/// Background price loop
///
/// Runs until stopped, superseded by a newer start, or the consecutive
/// error ceiling is reached. Both the iteration and the wait are cut short
/// by the shutdown signal.
async fn price_update_loop<F: PriceFeed>(
    inner: Arc<BotInner<F>>,
    generation: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(generation, "🔄 Price update loop starting...");

    while inner.is_current(generation) {
        let result = tokio::select! {
            result = inner.run_iteration() => result,
            _ = shutdown.changed() => break,
        };

        let wait = match result {
            Ok(outcome) => {
                if let IterationOutcome::Processed { price, .. } = outcome {
                    inner.error_count.store(0, Ordering::SeqCst);
                    tracing::debug!(price, "Tick processed");
                }
                inner.config.update_interval
            }
            Err(e) => {
                let errors = inner.error_count.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::error!(
                    errors,
                    max_errors = inner.config.max_errors,
                    "Error in price update loop: {}",
                    e
                );

                if errors >= inner.config.max_errors {
                    tracing::error!("Max errors reached, stopping bot");
                    if inner.generation.load(Ordering::SeqCst) == generation {
                        inner.running.store(false, Ordering::SeqCst);
                    }
                    break;
                }
                inner.config.error_backoff()
            }
        };

        tokio::select! {
            _ = sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
    }

    tracing::info!(generation, "Price update loop exited");
}

/// Coordinates the price feed, the engine and the activity log
///
/// Cheap to clone; clones share the same engine and loop. The engine is
/// only ever touched under a single mutex, so a manual close cannot race a
/// liquidation from the loop.
pub struct TradingBot<F: PriceFeed> {
    inner: Arc<BotInner<F>>,
}

impl<F: PriceFeed> Clone for TradingBot<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: PriceFeed> TradingBot<F> {
    pub fn new(config: BotConfig, strategy: StrategyConfig, feed: F) -> Self {
        let state = BotState {
            engine: TrendFollowingEngine::new(strategy),
            price_history: RollingBuffer::new(config.price_history_cap, config.price_history_trim),
            activity_log: RollingBuffer::new(config.activity_log_cap, config.activity_log_trim),
            last_price: None,
            last_update: None,
        };
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(BotInner {
                config,
                feed,
                state: Mutex::new(state),
                running: AtomicBool::new(false),
                error_count: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                shutdown,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    pub fn feed(&self) -> &F {
        &self.inner.feed
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u32 {
        self.inner.error_count.load(Ordering::SeqCst)
    }

    /// Start the background price loop (no-op if already running)
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Start ignored: bot already running");
            return;
        }

        self.inner.error_count.store(0, Ordering::SeqCst);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.shutdown.send_replace(false);
        let shutdown = self.inner.shutdown.subscribe();

        let handle = tokio::spawn(price_update_loop(self.inner.clone(), generation, shutdown));
        let previous = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        // A previous loop that halted on errors has already exited
        drop(previous);

        tracing::info!(
            interval = ?self.inner.config.update_interval,
            "🚀 Trading bot started"
        );
    }

    /// Stop the loop and wait for it to exit
    ///
    /// Waits at most `stop_grace`; a loop still alive after that is aborted
    /// and reported as `ShutdownTimeout`. Stopping a stopped bot is a no-op.
    pub async fn stop(&self) -> Result<(), BotError> {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);

        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(mut handle) = handle {
            let grace = self.inner.config.stop_grace;
            if timeout(grace, &mut handle).await.is_err() {
                handle.abort();
                tracing::error!("Price loop did not exit within {:?}, aborted", grace);
                return Err(BotError::ShutdownTimeout(grace));
            }
        }

        if was_running {
            tracing::info!("👋 Trading bot stopped");
        }
        Ok(())
    }

    /// Run one iteration now, outside the periodic schedule
    ///
    /// Errors are returned to the caller. The loop's consecutive-error
    /// counter is neither incremented nor reset.
    pub async fn fetch_now(&self) -> Result<IterationOutcome, BotError> {
        self.inner.run_iteration().await
    }

    /// Feed a sample straight into the engine, as a successful fetch would
    pub fn process_sample(&self, timestamp: DateTime<Utc>, price: f64) -> Option<TradeAction> {
        self.inner.process_sample(timestamp, price)
    }

    /// Open a position at the last known price
    pub fn manual_open(&self, side: Side) -> bool {
        let mut state = self.inner.lock_state();
        let Some(price) = state.last_price else {
            tracing::warn!("Manual open failed: No price data available");
            return false;
        };

        let now = Utc::now();
        if !state.engine.open_position(side, price, now) {
            tracing::warn!("Manual open of {} rejected by strategy", side);
            return false;
        }

        state.record_activity(TradeAction::opened(side), price, now);
        true
    }

    /// Close the open position at the last known price
    pub fn manual_close(&self) -> Option<Trade> {
        self.inner.lock_state().manual_close()
    }

    /// Apply a partial parameter update; effective from the next tick
    pub fn update_parameters(&self, update: &ParameterUpdate) -> Result<(), BotError> {
        self.inner.lock_state().engine.update_parameters(update)?;
        Ok(())
    }

    /// Realize any open position, then clear the ledger, balance and log
    ///
    /// Returns the trade produced by closing the open position, if any.
    pub fn reset(&self) -> Option<Trade> {
        let mut state = self.inner.lock_state();

        let closed = if state.engine.has_position() {
            state.manual_close()
        } else {
            None
        };

        state.engine.reset();
        state.activity_log.clear();
        closed
    }

    pub fn status(&self) -> BotStatus {
        let state = self.inner.lock_state();
        let now = Utc::now();

        let current_position = state.engine.position().map(|p| {
            let mark = state.last_price.unwrap_or(p.entry_price);
            PositionSnapshot::capture(p, mark, now)
        });

        BotStatus {
            is_running: self.is_running(),
            last_price: state.last_price,
            last_update: state.last_update,
            error_count: self.error_count(),
            price_history_count: state.price_history.len(),
            activity_log_count: state.activity_log.len(),
            current_position,
        }
    }

    pub fn stats(&self) -> TradingStats {
        self.inner.lock_state().engine.stats()
    }

    /// Price history, oldest first; `limit` keeps only the most recent
    pub fn price_history(&self, limit: Option<usize>) -> Vec<PriceSnapshot> {
        let state = self.inner.lock_state();
        match limit {
            Some(n) => state.price_history.recent(n),
            None => state.price_history.to_vec(),
        }
    }

    pub fn activity_log(&self, limit: Option<usize>) -> Vec<ActivityEntry> {
        let state = self.inner.lock_state();
        match limit {
            Some(n) => state.activity_log.recent(n),
            None => state.activity_log.to_vec(),
        }
    }

    pub fn completed_trades(&self) -> Vec<Trade> {
        self.inner.lock_state().engine.trades().to_vec()
    }

    pub fn pnl_curve(&self) -> Vec<PnlPoint> {
        pnl_curve(self.inner.lock_state().engine.trades())
    }

    /// Read-only access to the engine under the state lock
    pub fn with_engine<R>(&self, f: impl FnOnce(&TrendFollowingEngine) -> R) -> R {
        f(&self.inner.lock_state().engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ScriptedPriceFeed;
    use std::time::Duration;

    fn fast_config() -> BotConfig {
        BotConfig {
            update_interval: Duration::from_millis(10),
            error_backoff_cap: Duration::from_millis(10),
            fetch_timeout: Duration::from_secs(1),
            stop_grace: Duration::from_secs(1),
            ..Default::default()
        }
    }

    fn bot_with(feed: ScriptedPriceFeed, config: BotConfig) -> TradingBot<ScriptedPriceFeed> {
        TradingBot::new(config, StrategyConfig::default(), feed)
    }

    fn hard_error() -> Result<f64, FeedError> {
        Err(FeedError::InvalidQuote("garbled".to_string()))
    }

    fn soft_error() -> Result<f64, FeedError> {
        Err(FeedError::Unavailable {
            attempts: 3,
            reason: "timeout".to_string(),
        })
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn test_process_sample_logs_open() {
        let bot = bot_with(ScriptedPriceFeed::new(vec![]), fast_config());
        let start = Utc::now();

        let actions: Vec<_> = [100.0, 101.2, 102.5, 103.9]
            .iter()
            .enumerate()
            .map(|(i, &p)| bot.process_sample(start + chrono::Duration::seconds(i as i64), p))
            .collect();
        assert_eq!(actions[3], Some(TradeAction::OpenedLong));

        let status = bot.status();
        assert_eq!(status.last_price, Some(103.9));
        assert_eq!(status.price_history_count, 4);
        assert_eq!(status.activity_log_count, 1);
        assert!(status.current_position.is_some());

        let log = bot.activity_log(None);
        assert_eq!(log[0].action, TradeAction::OpenedLong);
        let snapshot = log[0].position.as_ref().unwrap();
        assert_eq!(snapshot.side, Side::Long);
        assert_eq!(snapshot.unrealized_pnl, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_now_outcomes() {
        let feed = ScriptedPriceFeed::new(vec![Ok(150.0), soft_error(), hard_error()]);
        let bot = bot_with(feed, fast_config());

        let outcome = bot.fetch_now().await.unwrap();
        assert!(matches!(
            outcome,
            IterationOutcome::Processed { price, action: None, .. } if price == 150.0
        ));

        let outcome = bot.fetch_now().await.unwrap();
        assert!(matches!(outcome, IterationOutcome::Skipped(_)));
        // A skipped tick records nothing
        assert_eq!(bot.price_history(None).len(), 1);

        let err = bot.fetch_now().await.unwrap_err();
        assert!(matches!(err, BotError::Feed(FeedError::InvalidQuote(_))));
        assert_eq!(bot.error_count(), 0);
    }

    #[tokio::test]
    async fn test_unusable_price_is_hard_failure() {
        let feed = ScriptedPriceFeed::new(vec![Ok(f64::NAN), Ok(-1.0)]);
        let bot = bot_with(feed, fast_config());

        assert!(matches!(bot.fetch_now().await, Err(BotError::InvalidPrice(_))));
        assert_eq!(bot.fetch_now().await, Err(BotError::InvalidPrice(-1.0)));
        assert!(bot.price_history(None).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_soft() {
        let feed = ScriptedPriceFeed::from_prices(&[150.0]).with_delay(Duration::from_millis(500));
        let bot = bot_with(
            feed,
            BotConfig {
                fetch_timeout: Duration::from_millis(20),
                ..fast_config()
            },
        );

        let outcome = bot.fetch_now().await.unwrap();
        assert!(matches!(outcome, IterationOutcome::Skipped(FeedError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_start_twice_runs_one_loop() {
        let feed = ScriptedPriceFeed::from_prices(&[150.0, 151.0, 152.0]);
        let bot = bot_with(
            feed,
            BotConfig {
                update_interval: Duration::from_secs(3600),
                ..fast_config()
            },
        );

        bot.start();
        bot.start();
        assert!(bot.is_running());

        // First iteration runs immediately; the next is an hour away
        wait_until(|| bot.price_history(None).len() == 1).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(bot.price_history(None).len(), 1);

        bot.stop().await.unwrap();
        assert!(!bot.is_running());
        bot.stop().await.unwrap();
        assert!(!bot.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let feed = ScriptedPriceFeed::from_prices(&[150.0, 151.0]);
        let bot = bot_with(
            feed,
            BotConfig {
                update_interval: Duration::from_secs(3600),
                ..fast_config()
            },
        );

        bot.start();
        wait_until(|| bot.price_history(None).len() == 1).await;
        bot.stop().await.unwrap();

        bot.start();
        wait_until(|| bot.price_history(None).len() == 2).await;
        bot.stop().await.unwrap();
        assert_eq!(bot.status().last_price, Some(151.0));
    }

    #[tokio::test]
    async fn test_max_errors_halts_loop() {
        let feed = ScriptedPriceFeed::new(vec![hard_error(), hard_error(), hard_error(), Ok(150.0)]);
        let bot = bot_with(
            feed,
            BotConfig {
                max_errors: 3,
                ..fast_config()
            },
        );

        bot.start();
        wait_until(|| !bot.is_running()).await;

        assert_eq!(bot.error_count(), 3);
        // Halted before reaching the good price
        assert!(bot.price_history(None).is_empty());
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_success_resets_error_count() {
        let feed = ScriptedPriceFeed::new(vec![hard_error(), hard_error(), Ok(150.0)]);
        let bot = bot_with(
            feed,
            BotConfig {
                max_errors: 3,
                ..fast_config()
            },
        );

        bot.start();
        wait_until(|| bot.price_history(None).len() == 1 && bot.error_count() == 0).await;
        assert!(bot.is_running());
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_failures_do_not_count() {
        let feed = ScriptedPriceFeed::new(vec![soft_error(); 20]);
        let bot = bot_with(
            feed,
            BotConfig {
                max_errors: 2,
                ..fast_config()
            },
        );

        bot.start();
        sleep(Duration::from_millis(100)).await;
        assert!(bot.is_running());
        assert_eq!(bot.error_count(), 0);
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_interrupts_inflight_fetch() {
        let feed = ScriptedPriceFeed::from_prices(&[150.0]).with_delay(Duration::from_secs(30));
        let bot = bot_with(
            feed,
            BotConfig {
                fetch_timeout: Duration::from_secs(60),
                ..fast_config()
            },
        );

        bot.start();
        sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        bot.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(bot.price_history(None).is_empty());
    }

    #[test]
    fn test_manual_ops_need_price() {
        let bot = bot_with(ScriptedPriceFeed::new(vec![]), fast_config());
        assert!(!bot.manual_open(Side::Long));
        assert!(bot.manual_close().is_none());
        assert!(bot.activity_log(None).is_empty());
    }

    #[test]
    fn test_manual_open_and_close() {
        let bot = bot_with(ScriptedPriceFeed::new(vec![]), fast_config());
        bot.process_sample(Utc::now(), 100.0);

        assert!(bot.manual_open(Side::Short));
        assert!(!bot.manual_open(Side::Long));

        let trade = bot.manual_close().unwrap();
        assert_eq!(trade.side, Side::Short);
        assert_eq!(trade.reason, ExitReason::Manual);
        assert_eq!(trade.exit_price, 100.0);
        assert!(bot.manual_close().is_none());

        let actions: Vec<TradeAction> = bot.activity_log(None).iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![TradeAction::OpenedShort, TradeAction::ManualClose]);
        assert_eq!(bot.completed_trades().len(), 1);
        assert_eq!(bot.pnl_curve().len(), 1);
    }

    #[test]
    fn test_reset_realizes_open_position() {
        let bot = bot_with(ScriptedPriceFeed::new(vec![]), fast_config());
        bot.process_sample(Utc::now(), 100.0);
        assert!(bot.manual_open(Side::Long));
        bot.process_sample(Utc::now(), 101.0);

        let closed = bot.reset().unwrap();
        assert_eq!(closed.reason, ExitReason::Manual);
        assert_eq!(closed.exit_price, 101.0);

        assert!(bot.completed_trades().is_empty());
        assert!(bot.activity_log(None).is_empty());
        assert!(bot.status().current_position.is_none());
        let stats = bot.stats();
        assert_eq!(stats.current_balance, 1000.0);
        assert_eq!(stats.total_fees, 0.0);
        // Price history is not part of the reset
        assert_eq!(bot.price_history(None).len(), 2);
    }

    #[test]
    fn test_update_parameters() {
        let bot = bot_with(ScriptedPriceFeed::new(vec![]), fast_config());

        bot.update_parameters(&ParameterUpdate {
            leverage: Some(10.0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(bot.with_engine(|e| e.config().leverage), 10.0);

        let err = bot
            .update_parameters(&ParameterUpdate {
                lookback_periods: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_activity_log_is_bounded() {
        let bot = bot_with(
            ScriptedPriceFeed::new(vec![]),
            BotConfig {
                activity_log_cap: 4,
                activity_log_trim: 2,
                ..fast_config()
            },
        );
        bot.process_sample(Utc::now(), 100.0);

        for _ in 0..3 {
            assert!(bot.manual_open(Side::Long));
            assert!(bot.manual_close().is_some());
        }

        // 6 entries written; trimmed to 2 at the fifth
        let log = bot.activity_log(None);
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().action, TradeAction::ManualClose);
        assert_eq!(bot.activity_log(Some(1)).len(), 1);
    }

    #[test]
    fn test_price_history_limit() {
        let bot = bot_with(ScriptedPriceFeed::new(vec![]), fast_config());
        for i in 0..10 {
            bot.process_sample(Utc::now(), 100.0 + i as f64);
        }

        let recent = bot.price_history(Some(3));
        let prices: Vec<f64> = recent.iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![107.0, 108.0, 109.0]);
        assert_eq!(recent[0].token, "SOL");
    }

    #[tokio::test]
    async fn test_fetch_now_leaves_error_count() {
        let feed = ScriptedPriceFeed::new(vec![Ok(150.0), hard_error()]);
        let bot = bot_with(feed, fast_config());
        bot.inner.error_count.store(2, Ordering::SeqCst);

        assert!(bot.fetch_now().await.is_ok());
        assert_eq!(bot.error_count(), 2);

        assert!(bot.fetch_now().await.is_err());
        assert_eq!(bot.error_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_keep_timestamp_order() {
        let prices: Vec<f64> = (0..64).map(|i| 100.0 + i as f64 * 0.01).collect();
        let bot = bot_with(ScriptedPriceFeed::from_prices(&prices), fast_config());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let bot = bot.clone();
                tokio::spawn(async move { bot.fetch_now().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let history = bot.price_history(None);
        assert_eq!(history.len(), 64);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    /// Blocks its worker thread, so the loop cannot observe shutdown
    struct BlockingFeed {
        block: Duration,
    }

    impl PriceFeed for BlockingFeed {
        async fn get_price(&self) -> Result<f64, FeedError> {
            std::thread::sleep(self.block);
            Ok(150.0)
        }

        fn token(&self) -> &str {
            "SOL"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_grace_exceeded() {
        let bot = TradingBot::new(
            BotConfig {
                stop_grace: Duration::from_millis(50),
                ..fast_config()
            },
            StrategyConfig::default(),
            BlockingFeed {
                block: Duration::from_millis(600),
            },
        );

        bot.start();
        sleep(Duration::from_millis(20)).await;

        let err = bot.stop().await.unwrap_err();
        assert_eq!(err, BotError::ShutdownTimeout(Duration::from_millis(50)));
        assert!(!bot.is_running());
    }
}
