//! Training loop.
mod config;
mod sampler;

use crate::{
    base::{Agent, Env, ReplayBufferBase},
    processor::FrameProcessor,
    record::Recorder,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{info, warn};
pub use sampler::Sampler;
use std::path::Path;

/// Manages the training loop and the objects it needs.
///
/// The loop counts environment steps. Each step samples one transition and
/// pushes it into the replay buffer; every `opt_interval`-th step after the
/// warmup period also performs an optimization step. Checkpoints and record
/// flushes are scheduled on environment steps as well.
pub struct Trainer<E, R>
where
    E: Env,
    R: ReplayBufferBase,
{
    env_config: E::Config,
    replay_buffer_config: R::Config,
    config: TrainerConfig,
}

impl<E, R> Trainer<E, R>
where
    E: Env,
    R: ReplayBufferBase,
{
    /// Constructs a trainer.
    pub fn build(
        config: TrainerConfig,
        env_config: E::Config,
        replay_buffer_config: R::Config,
    ) -> Self {
        Self {
            env_config,
            replay_buffer_config,
            config,
        }
    }

    fn save_checkpoint<A: Agent<R>>(&self, agent: &A, env_steps: usize) {
        if let Some(template) = &self.config.checkpoint_path {
            let path = template.replace("{step}", &env_steps.to_string());
            match agent.save(Path::new(&path)) {
                Ok(()) => info!("Saved a checkpoint at {}", &path),
                Err(e) => warn!("Failed to save a checkpoint at {}: {}", &path, e),
            }
        }
    }

    /// Trains the agent.
    ///
    /// The processor is borrowed rather than owned so the caller can finalize
    /// its video output after training.
    pub fn train<A>(
        &mut self,
        agent: &mut A,
        processor: &mut FrameProcessor,
        recorder: &mut dyn Recorder,
    ) -> Result<()>
    where
        A: Agent<R>,
    {
        let env = E::build(&self.env_config, self.config.seed)?;
        let mut buffer = R::build(&self.replay_buffer_config);
        let mut sampler = Sampler::new(env);
        agent.train();

        for env_steps in 1..=self.config.max_steps {
            let mut record = sampler.sample_and_push(agent, processor, &mut buffer)?;

            if env_steps >= self.config.warmup_period
                && env_steps % self.config.opt_interval == 0
            {
                if let Some(record_agent) = agent.opt(&mut buffer) {
                    record = record.merge(record_agent);
                }
            }

            if !record.is_empty() {
                recorder.store(record);
            }

            if env_steps % self.config.flush_record_interval == 0 {
                recorder.flush(env_steps);
            }

            if self.config.checkpoint_interval > 0
                && env_steps % self.config.checkpoint_interval == 0
            {
                self.save_checkpoint(agent, env_steps);
            }
        }

        recorder.flush(self.config.max_steps);

        Ok(())
    }
}
