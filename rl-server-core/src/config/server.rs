//! Configuration of the trainer.
use crate::{
    error::RlServerError,
    replay_buffer::{PerConfig, ReplayBufferConfig},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration of the replay buffer and the training scheduler.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Number of transitions per batch.
    pub batch_size: usize,

    /// Capacity of the replay buffer in slots.
    pub experience_replay_buffer_size: usize,

    /// Samples batches with prioritized experience replay.
    pub use_prioritized_buffer: bool,

    /// Trains inline after each act call if `true`, in a background loop otherwise.
    pub use_synchronous_update: bool,

    /// Maximal number of rewards summed into a return.
    pub n_step: usize,

    /// Discount factor.
    pub gamma: f64,

    /// Stored transitions per optimization step. Values below `1` give
    /// several steps per trigger.
    pub train_every_nth: f64,

    /// Number of observations stacked into a state.
    pub history_length: usize,

    /// Initial exponent of importance-sampling weights.
    pub initial_beta: f64,

    /// Increment of the exponent per optimization step.
    pub beta_increment: f64,

    /// Exponent of priorities.
    pub priority_alpha: f64,

    /// Added to absolute TD errors.
    pub priority_eps: f64,

    /// Interval of target critic updates in optimization steps.
    pub target_critic_update_period: usize,

    /// Interval of target actor updates in optimization steps.
    pub target_actor_update_period: usize,

    /// Stored transitions before the first optimization step.
    pub start_learning_after: usize,

    /// Interval of stats in optimization steps.
    pub show_stats_period: usize,

    /// Interval of checkpoints in optimization steps.
    pub save_model_period: usize,

    /// Directory of checkpoints.
    pub save_path: PathBuf,

    /// Port of the first actor endpoint; actor `i` uses `init_port + i`.
    pub init_port: u16,

    /// Random seed of the replay buffer.
    pub seed: u64,

    /// Sleep of the background loop while the buffer is under the learning threshold.
    pub async_idle_sleep_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            batch_size: 96,
            experience_replay_buffer_size: 1_000_000,
            use_prioritized_buffer: false,
            use_synchronous_update: true,
            n_step: 1,
            gamma: 0.99,
            train_every_nth: 4.0,
            history_length: 3,
            initial_beta: 0.4,
            beta_increment: 1e-6,
            priority_alpha: 0.6,
            priority_eps: 1e-6,
            target_critic_update_period: 500,
            target_actor_update_period: 500,
            start_learning_after: 5000,
            show_stats_period: 2000,
            save_model_period: 10000,
            save_path: PathBuf::from("ckpt/"),
            init_port: 8777,
            seed: 42,
            async_idle_sleep_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the capacity of the replay buffer.
    pub fn experience_replay_buffer_size(mut self, v: usize) -> Self {
        self.experience_replay_buffer_size = v;
        self
    }

    /// Sets prioritized experience replay.
    pub fn use_prioritized_buffer(mut self, v: bool) -> Self {
        self.use_prioritized_buffer = v;
        self
    }

    /// Sets synchronous training.
    pub fn use_synchronous_update(mut self, v: bool) -> Self {
        self.use_synchronous_update = v;
        self
    }

    /// Sets the number of steps of returns.
    pub fn n_step(mut self, v: usize) -> Self {
        self.n_step = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the number of stored transitions per optimization step.
    pub fn train_every_nth(mut self, v: f64) -> Self {
        self.train_every_nth = v;
        self
    }

    /// Sets the history length.
    pub fn history_length(mut self, v: usize) -> Self {
        self.history_length = v;
        self
    }

    /// Sets the initial exponent of importance-sampling weights.
    pub fn initial_beta(mut self, v: f64) -> Self {
        self.initial_beta = v;
        self
    }

    /// Sets the increment of the exponent per optimization step.
    pub fn beta_increment(mut self, v: f64) -> Self {
        self.beta_increment = v;
        self
    }

    /// Sets the exponent of priorities.
    pub fn priority_alpha(mut self, v: f64) -> Self {
        self.priority_alpha = v;
        self
    }

    /// Sets the interval of target critic updates.
    pub fn target_critic_update_period(mut self, v: usize) -> Self {
        self.target_critic_update_period = v;
        self
    }

    /// Sets the interval of target actor updates.
    pub fn target_actor_update_period(mut self, v: usize) -> Self {
        self.target_actor_update_period = v;
        self
    }

    /// Sets the learning threshold.
    pub fn start_learning_after(mut self, v: usize) -> Self {
        self.start_learning_after = v;
        self
    }

    /// Sets the interval of stats.
    pub fn show_stats_period(mut self, v: usize) -> Self {
        self.show_stats_period = v;
        self
    }

    /// Sets the interval of checkpoints.
    pub fn save_model_period(mut self, v: usize) -> Self {
        self.save_model_period = v;
        self
    }

    /// Sets the directory of checkpoints.
    pub fn save_path(mut self, v: impl Into<PathBuf>) -> Self {
        self.save_path = v.into();
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the sleep of the background loop.
    pub fn async_idle_sleep_ms(mut self, v: u64) -> Self {
        self.async_idle_sleep_ms = v;
        self
    }

    /// Number of optimization steps per synchronous trigger.
    pub fn steps_per_trigger(&self) -> usize {
        if self.train_every_nth < 1.0 {
            (1.0 / self.train_every_nth).ceil() as usize
        } else {
            1
        }
    }

    /// Configuration of the replay buffer.
    pub fn replay_buffer_config(&self) -> ReplayBufferConfig {
        let per_config = if self.use_prioritized_buffer {
            Some(
                PerConfig::default()
                    .alpha(self.priority_alpha)
                    .eps(self.priority_eps),
            )
        } else {
            None
        };
        ReplayBufferConfig::default()
            .capacity(self.experience_replay_buffer_size)
            .seed(self.seed)
            .per_config(per_config)
    }

    /// Checks the ranges of the values.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(RlServerError::InvalidConfig(msg).into()) };
        let min_fill = self.history_length + self.n_step;

        if self.batch_size == 0 {
            return invalid("batch_size must be positive".into());
        }
        if self.history_length == 0 {
            return invalid("history_length must be positive".into());
        }
        if self.n_step == 0 {
            return invalid("n_step must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !(self.train_every_nth > 0.0 && self.train_every_nth.is_finite()) {
            return invalid(format!(
                "train_every_nth must be positive, got {}",
                self.train_every_nth
            ));
        }
        if self.experience_replay_buffer_size <= min_fill {
            return invalid(format!(
                "experience_replay_buffer_size must be larger than history_length + n_step = {}",
                min_fill
            ));
        }
        if self.start_learning_after < min_fill {
            return invalid(format!(
                "start_learning_after must be at least history_length + n_step = {}",
                min_fill
            ));
        }
        if self.target_critic_update_period == 0
            || self.target_actor_update_period == 0
            || self.show_stats_period == 0
            || self.save_model_period == 0
        {
            return invalid("periods must be positive".into());
        }
        if self.priority_alpha < 0.0 || self.priority_eps <= 0.0 {
            return invalid("priority_alpha must be non-negative and priority_eps positive".into());
        }
        if self.initial_beta < 0.0 || self.beta_increment < 0.0 {
            return invalid("initial_beta and beta_increment must be non-negative".into());
        }
        Ok(())
    }
}
