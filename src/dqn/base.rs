//! DQN agent.
use super::{config::DqnConfig, explorer::DqnExplorer, model::DqnModel};
use crate::{
    base::{Agent, DiscreteAct, Policy, ReplayBufferBase},
    model::SubModel,
    processor::{state_batch_to_tensor, FrameStack},
    record::{Record, RecordValue},
    replay_buffer::TransitionBatch,
    util::{smooth_l1_loss, track, CriticLoss, OutDim},
};
use anyhow::Result;
use candle_core::{shape::D, Device, Tensor};
use candle_nn::loss::mse;
use log::warn;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{marker::PhantomData, path::Path};

#[allow(clippy::upper_case_acronyms)]
/// DQN agent with an online and a target Q-network.
///
/// The target network starts as a copy of the online network and is
/// synchronized to it every `soft_update_interval` optimization steps.
pub struct Dqn<Q, R>
where
    Q: SubModel,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    soft_update_interval: usize,
    soft_update_counter: usize,
    n_updates_per_opt: usize,
    min_transitions_warmup: usize,
    batch_size: usize,
    qnet: DqnModel<Q>,
    qnet_tgt: DqnModel<Q>,
    train: bool,
    discount_factor: f64,
    tau: f64,
    explorer: DqnExplorer,
    critic_loss: CriticLoss,
    eps_test: f64,
    device: Device,
    n_opts: usize,
    rng: SmallRng,
    phantom: PhantomData<R>,
}

impl<Q, R> Dqn<Q, R>
where
    Q: SubModel,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs the agent on the given device.
    pub fn build(config: DqnConfig<Q::Config>, device: Device) -> Result<Self> {
        let qnet = DqnModel::build(config.model_config.clone(), &device)?;
        let qnet_tgt = DqnModel::build(config.model_config, &device)?;

        // Start from identical networks.
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Dqn {
            qnet,
            qnet_tgt,
            soft_update_interval: config.soft_update_interval,
            soft_update_counter: 0,
            n_updates_per_opt: config.n_updates_per_opt,
            min_transitions_warmup: config.min_transitions_warmup,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            train: config.train,
            explorer: config.explorer,
            critic_loss: config.critic_loss,
            eps_test: config.eps_test,
            device,
            n_opts: 0,
            rng: SmallRng::seed_from_u64(42),
            phantom: PhantomData,
        })
    }

    fn q_values(&self, obs: &FrameStack) -> Result<Vec<f32>> {
        let x = state_batch_to_tensor(obs.as_slice(), 1, &self.device)?;
        let q = self.qnet.forward(&x)?;
        Ok(q.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let n = batch.len;

        let obs = state_batch_to_tensor(&batch.obs, n, &self.device)?;
        let next_obs = state_batch_to_tensor(&batch.next_obs, n, &self.device)?;
        let act = {
            let ixs: Vec<i64> = batch.act.iter().map(|a| *a as i64).collect();
            Tensor::from_slice(&ixs, (n, 1), &self.device)?
        };
        let reward = Tensor::from_slice(&batch.reward, (n,), &self.device)?;
        let is_not_done = {
            let v: Vec<f32> = batch.is_done.iter().map(|d| 1.0 - d).collect();
            Tensor::from_slice(&v, (n,), &self.device)?
        };

        let pred = self
            .qnet
            .forward(&obs)?
            .gather(&act, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            let q = self.qnet_tgt.forward(&next_obs)?.max(D::Minus1)?;
            let masked = ((is_not_done * self.discount_factor)? * q)?;
            (reward + masked)?.detach()
        };

        let loss = match self.critic_loss {
            CriticLoss::Mse => mse(&pred, &tgt)?,
            CriticLoss::SmoothL1 => smooth_l1_loss(&pred, &tgt)?,
        };

        self.qnet.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let mut loss_critic = 0f32;

        for _ in 0..self.n_updates_per_opt {
            loss_critic += self.update_critic(buffer)?;
        }

        self.soft_update_counter += 1;
        if self.soft_update_counter == self.soft_update_interval {
            self.soft_update_counter = 0;
            track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)?;
        }

        loss_critic /= self.n_updates_per_opt as f32;

        self.n_opts += 1;

        Ok(Record::from_slice(&[(
            "loss_critic",
            RecordValue::Scalar(loss_critic),
        )]))
    }
}

impl<Q, R> Policy for Dqn<Q, R>
where
    Q: SubModel,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// In evaluation mode, takes a random action with probability `eps_test`.
    fn sample(&mut self, obs: &FrameStack) -> DiscreteAct {
        let q = self.q_values(obs).unwrap();

        let a = if self.train {
            self.explorer.action(&q, &mut self.rng)
        } else if self.rng.gen::<f64>() < self.eps_test {
            self.rng.gen_range(0..q.len())
        } else {
            q.iter()
                .enumerate()
                .max_by(|(_, x), (_, y)| x.partial_cmp(y).unwrap())
                .map(|(i, _)| i)
                .unwrap()
        };

        DiscreteAct::from(a as u8)
    }
}

impl<Q, R> Agent<R> for Dqn<Q, R>
where
    Q: SubModel,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt(&mut self, buffer: &mut R) -> Option<Record> {
        if buffer.len() >= self.min_transitions_warmup {
            match self.opt_(buffer) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Optimization step failed: {}", e);
                    None
                }
            }
        } else {
            None
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.qnet.save(path)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path)?;
        track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), 1.0)?;
        Ok(())
    }
}
