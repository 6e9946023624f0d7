//! Learning algorithm.
use crate::{
    error::RlServerError,
    replay_buffer::{Batch, ObsBatch},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr};

/// How an [`Algorithm`] chooses actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActMode {
    /// Actions from the (possibly stochastic) policy.
    Default,

    /// Mean actions of a stochastic policy.
    Deterministic,

    /// Actions together with the gradients of the critic with respect to them.
    WithGradients,
}

impl Default for ActMode {
    fn default() -> Self {
        Self::Default
    }
}

impl FromStr for ActMode {
    type Err = RlServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "deterministic" | "sac_deterministic" => Ok(Self::Deterministic),
            "with_gradients" => Ok(Self::WithGradients),
            _ => Err(RlServerError::UnknownActMode(s.to_string())),
        }
    }
}

/// Actor/critic learning algorithm with target networks.
///
/// Implementations own the networks and the optimizers. Acting only reads
/// the weights, while training and target updates modify them.
pub trait Algorithm: Send + Sync {
    /// Weights published to remote actors.
    type Weights: Clone + Send + Sync;

    /// Chooses actions for a batch of history-stacked states.
    ///
    /// `states` has one entry per observation modality, each of shape
    /// `[batch, history_len, *obs_shape]`.
    fn act_batch(&self, states: &[ObsBatch], mode: ActMode) -> Result<Vec<Vec<f32>>>;

    /// Performs a gradient step and returns the loss.
    ///
    /// When `batch.weight` is `Some(_)`, the loss of each sample is scaled by
    /// its importance-sampling weight.
    fn train(&mut self, batch: &Batch) -> Result<f32>;

    /// Computes TD errors of the samples in `batch`.
    fn get_td_errors(&self, batch: &Batch) -> Result<Vec<f64>>;

    /// Synchronizes the target critic(s) with the online critic(s).
    fn target_critic_update(&mut self);

    /// Synchronizes the target actor with the online actor.
    fn target_actor_update(&mut self);

    /// Returns the current weights.
    fn get_weights(&self) -> Self::Weights;

    /// Replaces the current weights.
    fn set_weights(&mut self, weights: &Self::Weights) -> Result<()>;

    /// Saves the parameters in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
