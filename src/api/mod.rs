pub mod jupiter;

pub use jupiter::{JupiterClient, JupiterConfig, JupiterError, Quote};
