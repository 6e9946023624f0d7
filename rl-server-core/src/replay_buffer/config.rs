//! Configuration of replay buffers.
use super::WeightNormalizer;
use crate::error::RlServerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration of prioritized experience replay.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent of priorities. `0` gives uniform sampling.
    pub alpha: f64,

    /// Added to absolute TD errors and lower bound of every priority.
    pub eps: f64,

    /// Normalization of importance-sampling weights.
    pub normalize: WeightNormalizer,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            eps: 1e-6,
            normalize: WeightNormalizer::Batch,
        }
    }
}

impl PerConfig {
    /// Sets the exponent of priorities.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the lower bound of priorities.
    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Sets the normalization of importance-sampling weights.
    pub fn normalize(mut self, normalize: WeightNormalizer) -> Self {
        self.normalize = normalize;
        self
    }

    /// Checks that priorities stay positive, `alpha >= 0` and `eps > 0`.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha >= 0. && self.alpha.is_finite()) {
            return Err(RlServerError::InvalidConfig(format!(
                "alpha must be non-negative, got {}",
                self.alpha
            ))
            .into());
        }
        if !(self.eps > 0. && self.eps.is_finite()) {
            return Err(RlServerError::InvalidConfig(format!(
                "eps must be positive, got {}",
                self.eps
            ))
            .into());
        }
        Ok(())
    }
}

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer) and
/// [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Number of slots.
    pub capacity: usize,

    /// Random seed for sampling.
    pub seed: u64,

    /// Prioritized experience replay, uniform sampling if `None`.
    pub per_config: Option<PerConfig>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            seed: 42,
            per_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the number of slots.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the configuration of prioritized experience replay.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }
}
