// Trading engine and its bounded buffers
pub mod engine;
pub mod rolling_buffer;

pub use engine::TrendFollowingEngine;
pub use rolling_buffer::RollingBuffer;
