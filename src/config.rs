use crate::api::JupiterConfig;
use crate::bot::BotConfig;
use crate::feed::{RetryPolicy, SyntheticConfig};
use crate::strategy::StrategyConfig;
use anyhow::{ensure, Context};
use ::config::{Config, Environment, File, Source};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator loop settings as they appear in files and env vars
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotSettings {
    pub update_interval_secs: u64,
    pub max_errors: u32,
    pub error_backoff_cap_secs: u64,
    pub fetch_timeout_secs: u64,
    pub stop_grace_secs: u64,
    pub price_history_cap: usize,
    pub price_history_trim: usize,
    pub activity_log_cap: usize,
    pub activity_log_trim: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            update_interval_secs: 30,
            max_errors: 10,
            error_backoff_cap_secs: 60,
            fetch_timeout_secs: 10,
            stop_grace_secs: 5,
            price_history_cap: 1000,
            price_history_trim: 500,
            activity_log_cap: 100,
            activity_log_trim: 50,
        }
    }
}

impl BotSettings {
    pub fn to_bot_config(&self) -> BotConfig {
        BotConfig {
            update_interval: Duration::from_secs(self.update_interval_secs),
            max_errors: self.max_errors,
            error_backoff_cap: Duration::from_secs(self.error_backoff_cap_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
            price_history_cap: self.price_history_cap,
            price_history_trim: self.price_history_trim,
            activity_log_cap: self.activity_log_cap,
            activity_log_trim: self.activity_log_trim,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.update_interval_secs > 0, "bot.update_interval_secs must be positive");
        ensure!(self.max_errors > 0, "bot.max_errors must be positive");
        ensure!(self.fetch_timeout_secs > 0, "bot.fetch_timeout_secs must be positive");
        ensure!(
            self.price_history_trim <= self.price_history_cap,
            "bot.price_history_trim ({}) exceeds price_history_cap ({})",
            self.price_history_trim,
            self.price_history_cap
        );
        ensure!(
            self.activity_log_trim <= self.activity_log_cap,
            "bot.activity_log_trim ({}) exceeds activity_log_cap ({})",
            self.activity_log_trim,
            self.activity_log_cap
        );
        Ok(())
    }
}

/// Full application configuration
///
/// Layered lowest to highest: built-in defaults, an optional `perpbot.toml`
/// (or any format the `config` crate recognizes under that name), then
/// `PERPBOT__<SECTION>__<KEY>` environment variables.
///
/// ```text
/// PERPBOT__STRATEGY__LEVERAGE=10
/// PERPBOT__BOT__UPDATE_INTERVAL_SECS=15
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub bot: BotSettings,
    pub jupiter: JupiterConfig,
    pub retry: RetryPolicy,
    pub synthetic: SyntheticConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_sources(
            File::with_name("perpbot").required(false),
            Environment::with_prefix("PERPBOT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_sources<S>(file: S, env: Environment) -> anyhow::Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let app: AppConfig = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.strategy.validate().context("Invalid [strategy] section")?;
        self.bot.validate()?;
        ensure!(
            (0.0..=1.0).contains(&self.synthetic.failure_rate),
            "synthetic.failure_rate must be within [0, 1]"
        );
        Ok(())
    }
}
