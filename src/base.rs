//! Core abstractions: environment, policy, agent and replay buffer.
mod agent;
mod env;
mod policy;
mod replay_buffer;
pub use agent::Agent;
pub use env::{DiscreteAct, Env, RgbObs, Step};
pub use policy::Policy;
pub use replay_buffer::{ReplayBufferBase, Transition};
