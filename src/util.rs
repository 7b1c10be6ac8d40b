//! Utilities shared by the agent and its networks.
use anyhow::Result;
use candle_core::{DType, Tensor};
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};

/// Loss applied to the temporal-difference error.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss, quadratic within one unit of error and linear beyond.
    SmoothL1,
}

/// Smooth L1 loss, averaged over all elements.
///
/// Behaves like half a squared error for errors below 1 and like an absolute
/// error above, which keeps gradients bounded when TD errors are large.
pub fn smooth_l1_loss(pred: &Tensor, tgt: &Tensor) -> Result<Tensor> {
    let diff = (pred - tgt)?.abs()?;
    let mask = diff.le(1.0)?.to_dtype(DType::F32)?;
    let quad = (diff.sqr()? * 0.5)?;
    let lin = (&diff - 0.5)?;
    let loss = ((&mask * quad)? + ((1.0 - &mask)? * lin)?)?;
    Ok(loss.mean_all()?)
}

/// Applies a soft update on variables.
///
/// Variables are matched by name across the two maps.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    let dest = dest.data().lock().unwrap();
    let src = src.data().lock().unwrap();

    dest.iter().for_each(|(k_dest, v_dest)| {
        let v_src = src.get(k_dest).unwrap();
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src).unwrap() + (1.0 - tau) * t_dest).unwrap();
        v_dest.set(&t_dest).unwrap();
    });

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::Init;

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + (1.0 - tau) * &t_dest)?;

        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        let vm_src = VarMap::new();
        vm_src.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm_src
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .set(&t_src)?;
        let vm_dest = VarMap::new();
        vm_dest.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm_dest
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .set(&t_dest)?;

        track(&vm_dest, &vm_src, tau)?;

        let tracked = vm_dest
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .to_vec1::<f32>()?;
        assert_eq!(tracked, t.to_vec1::<f32>()?);
        Ok(())
    }

    #[test]
    fn test_smooth_l1_regimes() -> Result<()> {
        let device = Device::Cpu;
        // small error: quadratic, 0.5 * 0.5^2 = 0.125
        let pred = Tensor::from_slice(&[0.5f32], (1,), &device)?;
        let tgt = Tensor::from_slice(&[0.0f32], (1,), &device)?;
        let loss = smooth_l1_loss(&pred, &tgt)?.to_scalar::<f32>()?;
        assert!((loss - 0.125).abs() < 1e-6);

        // large error: linear, 3.0 - 0.5 = 2.5
        let pred = Tensor::from_slice(&[3.0f32], (1,), &device)?;
        let loss = smooth_l1_loss(&pred, &tgt)?.to_scalar::<f32>()?;
        assert!((loss - 2.5).abs() < 1e-6);
        Ok(())
    }
}
