//! Replay buffer over single processed frames.
//!
//! Stacked windows are not stored; each entry is one 84x84 frame plus the
//! action, clipped reward and termination flag of its step. The temporal
//! window a sampled state consists of is reassembled here at batch time,
//! which keeps the memory footprint at one frame per step instead of four.
use crate::{
    base::{ReplayBufferBase, Transition},
    processor::{FRAME_LEN, WINDOW_LENGTH},
};
use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`FrameReplayBuffer`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FrameReplayBufferConfig {
    /// Maximum number of stored transitions.
    pub capacity: usize,

    /// Number of consecutive frames per sampled state.
    pub window: usize,

    /// Seed of the sampling RNG.
    pub seed: u64,
}

impl Default for FrameReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 500_000,
            window: WINDOW_LENGTH,
            seed: 123,
        }
    }
}

impl FrameReplayBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }
}

/// A sampled minibatch with flattened frame windows.
///
/// `obs` and `next_obs` hold `len * window * 84 * 84` bytes each; the
/// remaining fields hold `len` elements.
pub struct TransitionBatch {
    /// Stacked state windows, `u8` intensities.
    pub obs: Vec<u8>,

    /// Stacked successor state windows.
    pub next_obs: Vec<u8>,

    /// Action indices.
    pub act: Vec<u8>,

    /// Clipped rewards.
    pub reward: Vec<f32>,

    /// 1.0 where the episode terminated, otherwise 0.0.
    pub is_done: Vec<f32>,

    /// Number of transitions in the batch.
    pub len: usize,
}

/// A uniform-sampling ring buffer of single frames.
///
/// Windows assembled at sample time never straddle an episode boundary:
/// frames that would belong to the preceding episode are replaced with
/// zero frames, as if the episode had started with a blank screen.
pub struct FrameReplayBuffer {
    capacity: usize,
    window: usize,
    entries: Vec<Transition>,
    /// Next write position in `entries`.
    pos: usize,
    rng: StdRng,
}

impl FrameReplayBuffer {
    /// The transition at logical index `i`, where 0 is the oldest entry.
    fn at(&self, i: usize) -> &Transition {
        let phys = if self.entries.len() == self.capacity {
            (self.pos + i) % self.capacity
        } else {
            i
        };
        &self.entries[phys]
    }

    /// Appends the frame window ending at logical index `end` to `out`.
    ///
    /// Frames on the far side of a terminal transition within the window are
    /// written as zeros.
    fn extend_window(&self, end: usize, out: &mut Vec<u8>) {
        let start = end + 1 - self.window;

        // Index of the last terminal transition strictly before `end`, if it
        // falls inside the window.
        let mut boundary = None;
        for j in (start..end).rev() {
            if self.at(j).is_done != 0 {
                boundary = Some(j);
                break;
            }
        }

        for i in start..=end {
            match boundary {
                Some(b) if i <= b => out.extend(std::iter::repeat(0u8).take(FRAME_LEN)),
                _ => out.extend_from_slice(self.at(i).frame.as_slice()),
            }
        }
    }
}

impl ReplayBufferBase for FrameReplayBuffer {
    type Config = FrameReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Self {
        Self {
            capacity: config.capacity,
            window: config.window,
            entries: Vec::new(),
            pos: 0,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn push(&mut self, tr: Transition) -> Result<()> {
        if self.entries.len() < self.capacity {
            self.entries.push(tr);
        } else {
            self.entries[self.pos] = tr;
        }
        self.pos = (self.pos + 1) % self.capacity;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let n = self.len();
        if n < self.window + 1 {
            bail!("too few transitions for sampling: {}", n);
        }

        let frames_per_state = self.window * FRAME_LEN;
        let mut obs = Vec::with_capacity(size * frames_per_state);
        let mut next_obs = Vec::with_capacity(size * frames_per_state);
        let mut act = Vec::with_capacity(size);
        let mut reward = Vec::with_capacity(size);
        let mut is_done = Vec::with_capacity(size);

        for _ in 0..size {
            // `end` is the index of the newest frame of the sampled state;
            // the successor state ends one frame later, so the last entry of
            // the buffer is never a state end. A terminal frame cannot end a
            // state either: the action on its successor opens the next
            // episode, so such indices are redrawn.
            let mut end = self.rng.gen_range(self.window - 1..=n - 2);
            while self.at(end).is_done != 0 {
                end = self.rng.gen_range(self.window - 1..=n - 2);
            }

            self.extend_window(end, &mut obs);
            self.extend_window(end + 1, &mut next_obs);

            // Action, reward and termination belong to the step taken out of
            // the sampled state, recorded on its successor frame.
            let tr = self.at(end + 1);
            act.push(tr.act);
            reward.push(tr.reward);
            is_done.push(tr.is_done as f32);
        }

        Ok(TransitionBatch {
            obs,
            next_obs,
            act,
            reward,
            is_done,
            len: size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessedFrame;

    fn tr(v: u8, act: u8, reward: f32, is_done: i8) -> Transition {
        Transition {
            frame: ProcessedFrame::constant(v),
            act,
            reward,
            is_done,
        }
    }

    fn config(capacity: usize) -> FrameReplayBufferConfig {
        FrameReplayBufferConfig::default().capacity(capacity).seed(42)
    }

    #[test]
    fn evicts_oldest_at_capacity() -> Result<()> {
        let mut buf = FrameReplayBuffer::build(&config(8));
        for i in 0..12u8 {
            buf.push(tr(i, 0, 0.0, 0))?;
        }
        assert_eq!(buf.len(), 8);

        // oldest surviving frame is 4
        assert_eq!(buf.at(0).frame.as_slice()[0], 4);
        assert_eq!(buf.at(7).frame.as_slice()[0], 11);
        Ok(())
    }

    #[test]
    fn batch_has_expected_shapes() -> Result<()> {
        let mut buf = FrameReplayBuffer::build(&config(64));
        for i in 0..32u8 {
            buf.push(tr(i, i % 4, 1.0, 0))?;
        }

        let batch = buf.batch(5)?;
        assert_eq!(batch.len, 5);
        assert_eq!(batch.obs.len(), 5 * WINDOW_LENGTH * FRAME_LEN);
        assert_eq!(batch.next_obs.len(), 5 * WINDOW_LENGTH * FRAME_LEN);
        assert_eq!(batch.act.len(), 5);
        assert_eq!(batch.reward.len(), 5);
        assert_eq!(batch.is_done.len(), 5);
        Ok(())
    }

    #[test]
    fn windows_are_consecutive_frames() -> Result<()> {
        let mut buf = FrameReplayBuffer::build(&config(64));
        for i in 0..32u8 {
            buf.push(tr(i, 0, 0.0, 0))?;
        }

        let batch = buf.batch(16)?;
        for b in 0..16 {
            let state = &batch.obs[b * WINDOW_LENGTH * FRAME_LEN..(b + 1) * WINDOW_LENGTH * FRAME_LEN];
            let next = &batch.next_obs[b * WINDOW_LENGTH * FRAME_LEN..(b + 1) * WINDOW_LENGTH * FRAME_LEN];
            for w in 1..WINDOW_LENGTH {
                assert_eq!(state[w * FRAME_LEN], state[(w - 1) * FRAME_LEN] + 1);
            }
            // successor window is the state window shifted by one frame
            assert_eq!(next[0], state[FRAME_LEN]);
        }
        Ok(())
    }

    #[test]
    fn windows_do_not_cross_episode_boundaries() -> Result<()> {
        let mut buf = FrameReplayBuffer::build(&config(64));
        // one short episode ending at frame 5, then a second episode
        for i in 0..32u8 {
            let is_done = if i == 5 { 1 } else { 0 };
            buf.push(tr(i + 1, 0, 0.0, is_done))?;
        }

        let batch = buf.batch(256)?;
        for b in 0..256 {
            let state = &batch.obs[b * WINDOW_LENGTH * FRAME_LEN..(b + 1) * WINDOW_LENGTH * FRAME_LEN];
            let newest = state[(WINDOW_LENGTH - 1) * FRAME_LEN];
            if (7..=9).contains(&newest) {
                // windows ending shortly after the boundary are zero-padded
                // instead of showing frames of the finished episode
                let padded = WINDOW_LENGTH - (newest as usize - 6);
                for w in 0..WINDOW_LENGTH {
                    if w < padded {
                        assert_eq!(state[w * FRAME_LEN], 0, "window end {}", newest);
                    } else {
                        assert_ne!(state[w * FRAME_LEN], 0, "window end {}", newest);
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn states_never_end_on_a_terminal_frame() -> Result<()> {
        let mut buf = FrameReplayBuffer::build(&config(64));
        // episode with frames 10..=15 and action 1 everywhere, ending on
        // frame 15, followed by an episode with distinct frames, action
        // and reward
        for i in 10..=15u8 {
            buf.push(tr(i, 1, 0.0, if i == 15 { 1 } else { 0 }))?;
        }
        for i in 100..=110u8 {
            buf.push(tr(i, 9, 5.0, 0))?;
        }

        for _ in 0..200 {
            let batch = buf.batch(8)?;
            for b in 0..8 {
                let newest = batch.obs[(b + 1) * WINDOW_LENGTH * FRAME_LEN - 1];
                // a window ending on the dying frame would pair the first
                // episode's last state with the second episode's action
                assert_ne!(newest, 15, "state ends on a terminal frame");
                if batch.act[b] == 9 {
                    assert!(newest >= 100, "action of the second episode paired with a state of the first");
                    assert_eq!(batch.reward[b], 5.0);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn rejects_sampling_from_tiny_buffer() -> Result<()> {
        let mut buf = FrameReplayBuffer::build(&config(16));
        for i in 0..WINDOW_LENGTH as u8 {
            buf.push(tr(i, 0, 0.0, 0))?;
        }
        assert!(buf.batch(1).is_err());
        Ok(())
    }

    #[test]
    fn sampling_is_deterministic_for_a_seed() -> Result<()> {
        let mut b1 = FrameReplayBuffer::build(&config(64));
        let mut b2 = FrameReplayBuffer::build(&config(64));
        for i in 0..40u8 {
            b1.push(tr(i, i, i as f32, 0))?;
            b2.push(tr(i, i, i as f32, 0))?;
        }
        let x = b1.batch(8)?;
        let y = b2.batch(8)?;
        assert_eq!(x.act, y.act);
        assert_eq!(x.reward, y.reward);
        Ok(())
    }
}
