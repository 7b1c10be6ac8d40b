//! Deep Q-learning on Atari-style Breakout.
//!
//! The crate is organized in layers. [`base`] holds the environment, policy
//! and replay buffer interfaces. [`processor`] converts raw RGB frames into
//! the 84x84 grayscale representation everything downstream works with.
//! [`dqn`] implements the agent over a [`cnn::Cnn`] Q-network, [`trainer`]
//! drives the training loop and [`evaluator`] runs trained policies.
pub mod base;
pub mod cnn;
pub mod dqn;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod opt;
pub mod processor;
pub mod record;
pub mod replay_buffer;
pub mod trainer;
pub mod util;

pub use error::DqnAtariError;
