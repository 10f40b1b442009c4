// Trend detection and strategy parameters
pub mod signals;

pub use signals::{detect_trend, ConfigError, ParameterUpdate, StrategyConfig};
