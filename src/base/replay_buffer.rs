//! Replay buffer interface.
use crate::processor::ProcessedFrame;
use anyhow::Result;

/// One stored experience: the processed frame observed after taking `act`,
/// together with the clipped reward and the episode-termination flag.
///
/// Single frames, not stacked windows, are the unit of storage; temporal
/// windows are assembled when batches are sampled.
pub struct Transition {
    /// Processed frame `o_t+1`.
    pub frame: ProcessedFrame,

    /// Action index `a_t`.
    pub act: u8,

    /// Clipped reward `r_t`.
    pub reward: f32,

    /// 1 if the episode ended with this transition.
    pub is_done: i8,
}

/// A buffer storing transitions and producing training batches from them.
pub trait ReplayBufferBase {
    /// Configuration of the buffer.
    type Config: Clone;

    /// The batches this buffer produces.
    type Batch;

    /// Builds the buffer.
    fn build(config: &Self::Config) -> Self;

    /// Pushes a transition, evicting the oldest entry once at capacity.
    fn push(&mut self, tr: Transition) -> Result<()>;

    /// The number of stored transitions.
    fn len(&self) -> usize;

    /// Samples a batch of `size` transitions.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;
}
