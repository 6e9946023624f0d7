//! Environment.
use super::Observation;
use crate::{record::Record, ObsShapes};
use anyhow::Result;

/// Outcome of an environment step, `(o_t+1, r_t, done_t)` with additional information.
#[derive(Debug)]
pub struct Step {
    /// Observation after the step.
    pub obs: Observation,

    /// Reward of the step.
    pub reward: f64,

    /// Flag denoting if the episode has ended.
    pub is_done: bool,

    /// Information defined by the environment.
    pub info: Record,
}

/// Represents an environment with a continuous action space.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Observation>;

    /// Performes an environment step.
    fn step(&mut self, act: &[f32]) -> Result<Step>;

    /// Shapes of the observation modalities.
    fn observation_shapes(&self) -> ObsShapes;

    /// Dimension of the action space.
    fn action_size(&self) -> usize;
}
