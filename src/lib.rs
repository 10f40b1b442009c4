// Core modules
pub mod api;
pub mod bot;
pub mod config;
pub mod execution;
pub mod feed;
pub mod metrics;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use bot::{BotConfig, BotError, BotStatus, IterationOutcome, TradingBot};
pub use crate::config::AppConfig;
pub use execution::TrendFollowingEngine;
pub use feed::{FeedError, PriceFeed};
pub use metrics::TradingStats;
pub use models::*;
pub use strategy::{ParameterUpdate, StrategyConfig};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
