//! Convolutional Q-network with the architecture of the DQN paper.
use crate::{model::SubModel, util::OutDim};
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    sequential::{seq, Sequential},
    Module, VarBuilder,
};
use serde::{Deserialize, Serialize};

/// Configuration of [`Cnn`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CnnConfig {
    /// Number of stacked input frames.
    pub n_stack: i64,

    /// Number of actions, the output dimension.
    pub out_dim: i64,
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self {
            n_stack: 4,
            out_dim: 0,
        }
    }
}

impl CnnConfig {
    pub fn new(n_stack: i64, out_dim: i64) -> Self {
        Self { n_stack, out_dim }
    }
}

impl OutDim for CnnConfig {
    fn get_out_dim(&self) -> i64 {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: i64) {
        self.out_dim = v;
    }
}

/// Convolutional neural network mapping `(n, n_stack, 84, 84)` float inputs
/// in `[0, 1]` to one action value per action.
///
/// Input normalization happens upstream where batches are built; this
/// network consumes the already scaled tensors as-is.
pub struct Cnn {
    device: Device,
    seq: Sequential,
}

impl Cnn {
    fn stride(s: i64) -> Conv2dConfig {
        Conv2dConfig {
            stride: s as _,
            ..Default::default()
        }
    }

    fn create_net(vb: &VarBuilder, n_stack: i64, out_dim: i64) -> Result<Sequential> {
        let seq = seq()
            .add(conv2d(n_stack as _, 32, 8, Self::stride(4), vb.pp("c1"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(32, 64, 4, Self::stride(2), vb.pp("c2"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(64, 64, 3, Self::stride(1), vb.pp("c3"))?)
            .add_fn(|xs| xs.relu()?.flatten_from(1))
            .add(linear(3136, 512, vb.pp("l1"))?)
            .add_fn(|xs| xs.relu())
            .add(linear(512, out_dim as _, vb.pp("l2"))?);

        Ok(seq)
    }
}

impl SubModel for Cnn {
    type Config = CnnConfig;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let seq = Self::create_net(&vb, config.n_stack, config.out_dim)?;

        Ok(Self { device, seq })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.seq.forward(&x.to_device(&self.device)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn maps_frame_stacks_to_action_values() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let cnn = Cnn::build(vb, CnnConfig::new(4, 6))?;

        let x = Tensor::zeros((2, 4, 84, 84), DType::F32, &device)?;
        let q = cnn.forward(&x)?;
        assert_eq!(q.dims(), &[2, 6]);
        Ok(())
    }

    #[test]
    fn online_and_target_copies_share_names() -> Result<()> {
        let device = Device::Cpu;
        let vm1 = VarMap::new();
        let vm2 = VarMap::new();
        let _ = Cnn::build(
            VarBuilder::from_varmap(&vm1, DType::F32, &device),
            CnnConfig::new(4, 4),
        )?;
        let _ = Cnn::build(
            VarBuilder::from_varmap(&vm2, DType::F32, &device),
            CnnConfig::new(4, 4),
        )?;

        let names1: std::collections::BTreeSet<String> =
            vm1.data().lock().unwrap().keys().cloned().collect();
        let names2: std::collections::BTreeSet<String> =
            vm2.data().lock().unwrap().keys().cloned().collect();
        assert_eq!(names1, names2);
        assert!(names1.contains("c1.weight"));
        assert!(names1.contains("c1.bias"));
        assert!(names1.contains("l2.weight"));
        Ok(())
    }
}
