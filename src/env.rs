//! Environments.
mod breakout;

pub use breakout::{BreakoutEnv, GameEnvConfig};
