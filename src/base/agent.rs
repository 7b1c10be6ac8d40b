//! Agent interface.
use super::{Policy, ReplayBufferBase};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// A trainable policy.
pub trait Agent<R: ReplayBufferBase>: Policy {
    /// Switches to training mode.
    fn train(&mut self);

    /// Switches to evaluation mode.
    fn eval(&mut self);

    /// Returns if the agent is in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step with transitions sampled from `buffer`.
    ///
    /// Returns `None` when the step was skipped, e.g. while the replay buffer
    /// is still warming up.
    fn opt(&mut self, buffer: &mut R) -> Option<Record>;

    /// Saves the network parameters to the given file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads the network parameters from the given file.
    fn load(&mut self, path: &Path) -> Result<()>;
}
