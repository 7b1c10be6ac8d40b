//! Policy interface.
use super::DiscreteAct;
use crate::processor::FrameStack;

/// A mapping from stacked frames to an action.
///
/// The mapping can be deterministic or stochastic. Policies consume the
/// 4-frame window assembled by the preprocessing pipeline rather than raw
/// environment observations.
pub trait Policy {
    /// Samples an action given the current frame stack.
    fn sample(&mut self, obs: &FrameStack) -> DiscreteAct;
}
