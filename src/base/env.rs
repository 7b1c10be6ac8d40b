//! Environment interface.
use anyhow::Result;

/// A raw observation emitted by an environment.
///
/// The pixel data is row-major RGB with explicit height, width and channel
/// axes, i.e. `data.len() == height * width * 3`. It is handed to the
/// [`FrameProcessor`](crate::processor::FrameProcessor) right after each step
/// and is not retained afterwards.
#[derive(Clone, Debug)]
pub struct RgbObs {
    /// Frame height in pixels.
    pub height: u32,

    /// Frame width in pixels.
    pub width: u32,

    /// Interleaved RGB bytes, `height * width * 3` of them.
    pub data: Vec<u8>,
}

impl RgbObs {
    /// An all-black frame of the given size.
    pub fn zeros(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            data: vec![0; (height * width * 3) as usize],
        }
    }
}

/// A discrete action, an index into the environment's action set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscreteAct {
    /// The action index.
    pub act: u8,
}

impl From<u8> for DiscreteAct {
    fn from(act: u8) -> Self {
        Self { act }
    }
}

/// The result of one environment step: `(o_t+1, r_t, done_t)`.
pub struct Step {
    /// Observation after the step.
    pub obs: RgbObs,

    /// Raw, unclipped reward.
    pub reward: f32,

    /// Whether the episode terminated (or was truncated) with this step.
    pub is_done: bool,
}

impl Step {
    pub fn new(obs: RgbObs, reward: f32, is_done: bool) -> Self {
        Self {
            obs,
            reward,
            is_done,
        }
    }
}

/// An environment with reset/step/action-count semantics.
pub trait Env {
    /// Configuration of the environment.
    type Config: Clone;

    /// Builds the environment with a random seed.
    fn build(config: &Self::Config, seed: u64) -> Result<Self>
    where
        Self: Sized;

    /// The number of available actions.
    fn n_actions(&self) -> usize;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<RgbObs>;

    /// Applies an action.
    fn step(&mut self, act: &DiscreteAct) -> Step;
}
