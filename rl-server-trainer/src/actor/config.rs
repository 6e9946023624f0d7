//! Configuration of [`Actor`](crate::Actor).
use anyhow::Result;
use rl_server_core::error::RlServerError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of [`Actor`](crate::Actor).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ActorConfig {
    /// Id of the actor, tagged on the shipped episodes.
    pub agent_id: usize,

    /// If `true`, actions are noiseless and rewards go to the test log.
    pub validation: bool,

    /// Standard deviation of the Gaussian noise added to actions.
    pub exploration_noise: f64,

    /// Number of observations stacked into a state.
    pub history_length: usize,

    /// Episodes are cut at this many steps.
    pub max_episode_len: usize,

    /// Name of the act mode, parsed when the actor is built.
    pub act_mode: String,

    /// Refreshes the policy every this many episodes.
    pub fetch_every: usize,

    /// Directory of the rewards log, no log if `None`.
    pub logdir: Option<PathBuf>,

    /// Seed of the environment and of the exploration noise.
    pub seed: i64,

    /// Stops after this many episodes, runs until stopped if `None`.
    pub max_episodes: Option<usize>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            agent_id: 0,
            validation: false,
            exploration_noise: 0.02,
            history_length: 3,
            max_episode_len: 1000,
            act_mode: "default".to_string(),
            fetch_every: 1,
            logdir: None,
            seed: 42,
            max_episodes: None,
        }
    }
}

impl ActorConfig {
    /// Sets the id of the actor.
    pub fn agent_id(mut self, v: usize) -> Self {
        self.agent_id = v;
        self
    }

    /// Sets the validation flag.
    pub fn validation(mut self, v: bool) -> Self {
        self.validation = v;
        self
    }

    /// Sets the standard deviation of exploration noise.
    pub fn exploration_noise(mut self, v: f64) -> Self {
        self.exploration_noise = v;
        self
    }

    /// Sets the history length.
    pub fn history_length(mut self, v: usize) -> Self {
        self.history_length = v;
        self
    }

    /// Sets the maximal length of episodes.
    pub fn max_episode_len(mut self, v: usize) -> Self {
        self.max_episode_len = v;
        self
    }

    /// Sets the act mode.
    pub fn act_mode(mut self, v: impl Into<String>) -> Self {
        self.act_mode = v.into();
        self
    }

    /// Sets the interval of policy refreshes in episodes.
    pub fn fetch_every(mut self, v: usize) -> Self {
        self.fetch_every = v;
        self
    }

    /// Sets the directory of the rewards log.
    pub fn logdir(mut self, v: impl Into<PathBuf>) -> Self {
        self.logdir = Some(v.into());
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the number of episodes to run.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = Some(v);
        self
    }

    /// Checks the ranges of the values.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(RlServerError::InvalidConfig(msg).into()) };
        if self.max_episode_len == 0 {
            return invalid("max_episode_len must be positive".into());
        }
        if self.history_length == 0 {
            return invalid("history_length must be positive".into());
        }
        if !(self.exploration_noise >= 0.0 && self.exploration_noise.is_finite()) {
            return invalid(format!(
                "exploration_noise must be non-negative, got {}",
                self.exploration_noise
            ));
        }
        Ok(())
    }

    /// Constructs [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(rdr)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves [`ActorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
