//! Evaluate a trained policy.
use crate::{
    base::{Env, Policy},
    processor::{FrameProcessor, FrameStack},
    record::{Record, RecordValue::Scalar},
};
use anyhow::Result;
use log::info;

/// Evaluates a policy.
///
/// The caller needs to handle the internal state of the policy, like
/// switching between training and evaluation mode.
pub trait Evaluator<A: Policy> {
    /// Runs the evaluation and returns its aggregated results.
    fn evaluate(&mut self, policy: &mut A, processor: &mut FrameProcessor) -> Result<Record>;
}

/// Runs a fixed number of episodes and averages their returns.
///
/// Returns are raw game scores; reward clipping only applies to stored
/// transitions during training.
pub struct DefaultEvaluator<E: Env> {
    /// The number of episodes to run during evaluation.
    n_episodes: usize,

    env: E,
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs the evaluator with its own environment instance.
    pub fn new(config: &E::Config, seed: u64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }
}

impl<E: Env, A: Policy> Evaluator<A> for DefaultEvaluator<E> {
    fn evaluate(&mut self, policy: &mut A, processor: &mut FrameProcessor) -> Result<Record> {
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let obs = self.env.reset()?;
            let frame = processor.process_observation(&obs)?;
            let mut stack = FrameStack::from_initial(&frame);

            let mut episode_return = 0f32;
            let mut episode_len = 0usize;
            loop {
                let act = policy.sample(&stack);
                let step = self.env.step(&act);
                episode_return += step.reward;
                episode_len += 1;
                if step.is_done {
                    break;
                }
                stack.push(&processor.process_observation(&step.obs)?);
            }

            info!(
                "Episode {}: reward {:.1}, {} steps",
                ix + 1,
                episode_return,
                episode_len
            );
            r_total += episode_return;
        }

        Ok(Record::from_slice(&[(
            "episode_return",
            Scalar(r_total / self.n_episodes as f32),
        )]))
    }
}
