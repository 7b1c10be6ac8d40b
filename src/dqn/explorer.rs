//! Exploration strategies of DQN.
use rand::{distributions::WeightedIndex, Rng};
use serde::{Deserialize, Serialize};

fn argmax(q: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in q.iter().enumerate() {
        if *v > q[best] {
            best = i;
        }
    }
    best
}

/// Explorers for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum DqnExplorer {
    /// Softmax action selection.
    Softmax(Softmax),

    /// Epsilon-greedy action selection.
    EpsilonGreedy(EpsilonGreedy),
}

impl DqnExplorer {
    /// Takes an action based on action values.
    pub fn action(&mut self, q: &[f32], rng: &mut impl Rng) -> usize {
        match self {
            Self::Softmax(softmax) => softmax.action(q, rng),
            Self::EpsilonGreedy(egreedy) => egreedy.action(q, rng),
        }
    }
}

/// Softmax explorer for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Softmax {}

#[allow(clippy::new_without_default)]
impl Softmax {
    /// Constructs softmax explorer.
    pub fn new() -> Self {
        Self {}
    }

    /// Samples an action with probabilities proportional to `exp(q)`.
    ///
    /// * `q` - action values.
    pub fn action(&mut self, q: &[f32], rng: &mut impl Rng) -> usize {
        let max = q.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = q.iter().map(|v| (v - max).exp()).collect();
        rng.sample(WeightedIndex::new(&exps).unwrap())
    }
}

/// Epsilon-greedy explorer with a linearly annealed epsilon.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    pub n_steps: usize,
    pub eps_start: f64,
    pub eps_final: f64,
    pub final_step: usize,
}

#[allow(clippy::new_without_default)]
impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new() -> Self {
        Self {
            n_steps: 0,
            eps_start: 1.0,
            eps_final: 0.1,
            final_step: 1_000_000,
        }
    }

    /// Constructs epsilon-greedy explorer with the given annealing length.
    pub fn with_final_step(final_step: usize) -> DqnExplorer {
        DqnExplorer::EpsilonGreedy(Self {
            n_steps: 0,
            eps_start: 1.0,
            eps_final: 0.1,
            final_step,
        })
    }

    /// The epsilon value at the current step.
    pub fn eps(&self) -> f64 {
        let d = (self.eps_start - self.eps_final) / (self.final_step as f64);
        (self.eps_start - d * self.n_steps as f64).max(self.eps_final)
    }

    /// Takes an action based on action values.
    ///
    /// * `q` - action values.
    pub fn action(&mut self, q: &[f32], rng: &mut impl Rng) -> usize {
        let eps = self.eps();
        let is_random = rng.gen::<f32>() < eps as f32;
        self.n_steps += 1;

        if is_random {
            rng.gen_range(0..q.len())
        } else {
            argmax(q)
        }
    }

    /// Sets the epsilon value at the final step.
    pub fn eps_final(self, v: f64) -> Self {
        let mut s = self;
        s.eps_final = v;
        s
    }

    /// Sets the epsilon value at the start.
    pub fn eps_start(self, v: f64) -> Self {
        let mut s = self;
        s.eps_start = v;
        s
    }
}
