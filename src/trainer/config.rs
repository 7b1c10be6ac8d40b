//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// All intervals are counted in environment steps.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The total number of environment steps.
    pub max_steps: usize,

    /// Interval of optimization steps.
    pub opt_interval: usize,

    /// Number of steps taken before optimization starts.
    pub warmup_period: usize,

    /// Interval of saving checkpoints; 0 disables checkpoints.
    pub checkpoint_interval: usize,

    /// Checkpoint path template; `{step}` is replaced by the step count.
    pub checkpoint_path: Option<String>,

    /// Interval of flushing aggregated records.
    pub flush_record_interval: usize,

    /// Seed of the training environment.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_750_000,
            opt_interval: 4,
            warmup_period: 50_000,
            checkpoint_interval: 250_000,
            checkpoint_path: None,
            flush_record_interval: 10_000,
            seed: 123,
        }
    }
}

impl TrainerConfig {
    /// Sets the total number of environment steps.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the interval of optimization in environment steps.
    pub fn opt_interval(mut self, v: usize) -> Self {
        self.opt_interval = v;
        self
    }

    /// Sets the warmup period in environment steps.
    pub fn warmup_period(mut self, v: usize) -> Self {
        self.warmup_period = v;
        self
    }

    /// Sets the interval of saving checkpoints.
    pub fn checkpoint_interval(mut self, v: usize) -> Self {
        self.checkpoint_interval = v;
        self
    }

    /// Sets the checkpoint path template.
    pub fn checkpoint_path(mut self, v: Option<String>) -> Self {
        self.checkpoint_path = v;
        self
    }

    /// Sets the interval of flushing records.
    pub fn flush_record_interval(mut self, v: usize) -> Self {
        self.flush_record_interval = v;
        self
    }

    /// Sets the seed of the training environment.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`TrainerConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
