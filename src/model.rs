//! Interface of the neural networks used by the agent.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// A network whose variables live in a [`VarMap`] owned by the caller.
///
/// Building the same configuration against two different [`VarBuilder`]s is
/// how the online and target networks of the agent get independent copies of
/// the same architecture.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait SubModel {
    /// Configuration from which the network is constructed.
    type Config;

    /// Builds the network, registering its variables through `vb`.
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Forward computation.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;
}
