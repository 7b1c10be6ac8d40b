//! Experience sampling.
use crate::{
    base::{Agent, Env, ReplayBufferBase, Transition},
    processor::{FrameProcessor, FrameStack},
    record::{Record, RecordValue::Scalar},
};
use anyhow::Result;

/// Samples transitions from an environment and pushes them into a replay
/// buffer.
///
/// Owns the environment and the frame stack the agent acts on. The stack is
/// dropped at episode ends and rebuilt from the first frame of the next
/// episode, so windows never mix frames of two episodes.
pub struct Sampler<E>
where
    E: Env,
{
    env: E,
    stack: Option<FrameStack>,
    episode_return: f32,
    episode_len: usize,
}

impl<E> Sampler<E>
where
    E: Env,
{
    /// Creates a sampler over the given environment.
    pub fn new(env: E) -> Self {
        Self {
            env,
            stack: None,
            episode_return: 0.0,
            episode_len: 0,
        }
    }

    /// Performs one environment step and pushes the resulting transition.
    ///
    /// Returns a record with the episode return and length when the step
    /// ended an episode, and an empty record otherwise. Episode returns are
    /// raw game scores; only the stored rewards are clipped.
    pub fn sample_and_push<A, R>(
        &mut self,
        agent: &mut A,
        processor: &mut FrameProcessor,
        buffer: &mut R,
    ) -> Result<Record>
    where
        A: Agent<R>,
        R: ReplayBufferBase,
    {
        if self.stack.is_none() {
            let obs = self.env.reset()?;
            let frame = processor.process_observation(&obs)?;
            self.stack = Some(FrameStack::from_initial(&frame));
            self.episode_return = 0.0;
            self.episode_len = 0;
        }

        let stack = self.stack.as_mut().unwrap();
        let act = agent.sample(stack);
        let step = self.env.step(&act);

        let frame = processor.process_observation(&step.obs)?;
        let reward = processor.process_reward(step.reward);
        stack.push(&frame);

        buffer.push(Transition {
            frame,
            act: act.act,
            reward,
            is_done: step.is_done as i8,
        })?;

        self.episode_return += step.reward;
        self.episode_len += 1;

        if step.is_done {
            let record = Record::from_slice(&[
                ("episode_return", Scalar(self.episode_return)),
                ("episode_len", Scalar(self.episode_len as f32)),
            ]);
            self.stack = None;
            Ok(record)
        } else {
            Ok(Record::empty())
        }
    }
}
