//! Configuration of [`Dqn`](super::Dqn) agents.
use super::{
    explorer::{DqnExplorer, EpsilonGreedy},
    model::DqnModelConfig,
};
use crate::{opt::OptimizerConfig, util::{CriticLoss, OutDim}};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn) agents.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<Q>
where
    Q: OutDim,
{
    pub model_config: DqnModelConfig<Q>,

    /// Interval of synchronizing the target network, in optimization steps.
    pub soft_update_interval: usize,

    /// Gradient steps per call to `opt()`.
    pub n_updates_per_opt: usize,

    /// Minimum number of stored transitions before optimization starts.
    pub min_transitions_warmup: usize,

    pub batch_size: usize,
    pub discount_factor: f64,

    /// Soft update coefficient; 1.0 copies the online network verbatim.
    pub tau: f64,

    pub train: bool,
    pub explorer: DqnExplorer,
    pub critic_loss: CriticLoss,

    /// Probability of a random action in evaluation mode.
    pub eps_test: f64,
}

impl<Q> Default for DqnConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            model_config: DqnModelConfig::default(),
            soft_update_interval: 2500,
            n_updates_per_opt: 1,
            min_transitions_warmup: 50_000,
            batch_size: 32,
            discount_factor: 0.99,
            tau: 1.0,
            train: false,
            explorer: DqnExplorer::EpsilonGreedy(EpsilonGreedy::new()),
            critic_loss: CriticLoss::SmoothL1,
            eps_test: 0.05,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Sets the model configuration.
    pub fn model_config(mut self, v: DqnModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// Sets the output dimension of the Q-network.
    pub fn out_dim(mut self, v: i64) -> Self {
        self.model_config = self.model_config.out_dim(v);
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.model_config = self.model_config.opt_config(v);
        self
    }

    /// Sets the target network synchronization interval.
    pub fn soft_update_interval(mut self, v: usize) -> Self {
        self.soft_update_interval = v;
        self
    }

    /// Sets the number of gradient steps per optimization call.
    pub fn n_updates_per_opt(mut self, v: usize) -> Self {
        self.n_updates_per_opt = v;
        self
    }

    /// Sets the warmup threshold.
    pub fn min_transitions_warmup(mut self, v: usize) -> Self {
        self.min_transitions_warmup = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the explorer.
    pub fn explorer(mut self, v: DqnExplorer) -> Self {
        self.explorer = v;
        self
    }

    /// Sets the critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Sets the evaluation-mode random action probability.
    pub fn eps_test(mut self, v: f64) -> Self {
        self.eps_test = v;
        self
    }

    /// Constructs [`DqnConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::CnnConfig;
    use tempdir::TempDir;

    #[test]
    fn yaml_roundtrip() -> Result<()> {
        let dir = TempDir::new("dqn_config")?;
        let path = dir.path().join("agent.yaml");

        let config = DqnConfig::<CnnConfig>::default()
            .model_config(DqnModelConfig::default().q_config(CnnConfig::new(4, 4)))
            .batch_size(64);
        config.save(&path)?;

        let loaded = DqnConfig::<CnnConfig>::load(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }
}
