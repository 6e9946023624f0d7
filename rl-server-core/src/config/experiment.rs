//! Configuration of an experiment.
use super::{NetworkConfig, Schedule, ServerConfig};
use crate::{error::RlServerError, ObsShapes};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Supported algorithms.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AlgoName {
    /// DDPG, the only algorithm with a prioritized variant.
    Ddpg,

    /// DDPG with a categorical critic.
    CategoricalDdpg,

    /// DDPG with a quantile critic.
    QuantileDdpg,

    /// TD3.
    Td3,

    /// TD3 with quantile critics.
    QuantileTd3,

    /// Soft actor-critic.
    Sac,
}

impl AlgoName {
    /// Returns `true` if the algorithm can be trained with prioritized replay.
    pub fn supports_prioritized(&self) -> bool {
        matches!(self, Self::Ddpg)
    }

    /// Returns `true` if the actor of the algorithm can be recurrent.
    pub fn supports_lstm_actor(&self) -> bool {
        !matches!(self, Self::Sac)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Ddpg => "ddpg",
            Self::CategoricalDdpg => "categorical_ddpg",
            Self::QuantileDdpg => "quantile_ddpg",
            Self::Td3 => "td3",
            Self::QuantileTd3 => "quantile_td3",
            Self::Sac => "sac",
        }
    }
}

impl fmt::Display for AlgoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlgoName {
    type Err = RlServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ddpg" => Ok(Self::Ddpg),
            "categorical_ddpg" => Ok(Self::CategoricalDdpg),
            "quantile_ddpg" => Ok(Self::QuantileDdpg),
            "td3" => Ok(Self::Td3),
            "quantile_td3" => Ok(Self::QuantileTd3),
            "sac" => Ok(Self::Sac),
            _ => Err(RlServerError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Configuration of the environment.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EnvConfig {
    /// Shapes of the observation modalities.
    pub observation_shapes: ObsShapes,

    /// Dimension of actions.
    pub action_size: usize,

    /// Number of simulator steps per action.
    #[serde(default = "default_frame_skip")]
    pub frame_skip: usize,
}

fn default_frame_skip() -> usize {
    1
}

/// Hyperparameters handed to the algorithm as they are, e.g. `tau` or
/// the number of atoms of a categorical critic.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct AlgorithmConfig {
    /// Parameters by name.
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_yaml::Value>,
}

impl AlgorithmConfig {
    /// Gets a numeric parameter.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| v.as_f64())
    }
}

/// Shapes derived from an [`ExperimentConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnvShapes {
    /// Shapes of the observation modalities.
    pub observation_shapes: ObsShapes,

    /// Shapes of history-stacked states, `[history_length, *shape]` per modality.
    pub state_shapes: ObsShapes,

    /// Dimension of actions.
    pub action_size: usize,
}

/// Configuration of an experiment.
///
/// ```yaml
/// env:
///   observation_shapes: [[8]]
///   action_size: 2
/// algo_name: ddpg
/// server:
///   use_prioritized_buffer: true
///   history_length: 3
/// actor_optim:
///   schedule:
///     - limit: 0
///       lr: 0.001
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExperimentConfig {
    /// Environment.
    pub env: EnvConfig,

    /// Replay buffer and training scheduler.
    #[serde(default)]
    pub server: ServerConfig,

    /// Algorithm.
    pub algo_name: AlgoName,

    /// Hyperparameters of the algorithm.
    #[serde(default)]
    pub algorithm: AlgorithmConfig,

    /// Actor network.
    #[serde(default)]
    pub actor: NetworkConfig,

    /// Critic network.
    #[serde(default)]
    pub critic: NetworkConfig,

    /// Learning rates of the actor.
    #[serde(default)]
    pub actor_optim: Schedule,

    /// Learning rates of the critic.
    #[serde(default)]
    pub critic_optim: Schedule,

    /// Batch sizes.
    #[serde(default)]
    pub training: Schedule,

    /// The environment is a gym environment.
    #[serde(default)]
    pub is_gym: bool,

    /// Checkpoint loaded at startup.
    #[serde(default)]
    pub load_checkpoint: Option<PathBuf>,
}

impl ExperimentConfig {
    /// Creates a configuration with default values.
    pub fn new(env: EnvConfig, algo_name: AlgoName) -> Self {
        Self {
            env,
            server: ServerConfig::default(),
            algo_name,
            algorithm: AlgorithmConfig::default(),
            actor: NetworkConfig::default(),
            critic: NetworkConfig::default(),
            actor_optim: Schedule::default(),
            critic_optim: Schedule::default(),
            training: Schedule::default(),
            is_gym: false,
            load_checkpoint: None,
        }
    }

    /// Sets the configuration of the server.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Sets the configuration of the actor network.
    pub fn actor(mut self, actor: NetworkConfig) -> Self {
        self.actor = actor;
        self
    }

    /// Sets the configuration of the critic network.
    pub fn critic(mut self, critic: NetworkConfig) -> Self {
        self.critic = critic;
        self
    }

    /// Observation shapes, state shapes and action size.
    pub fn get_env_shapes(&self) -> EnvShapes {
        EnvShapes {
            observation_shapes: self.env.observation_shapes.clone(),
            state_shapes: self
                .env
                .observation_shapes
                .stacked(self.server.history_length),
            action_size: self.env.action_size,
        }
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.env.observation_shapes.n_parts() == 0 || self.env.action_size == 0 {
            return Err(RlServerError::InvalidConfig(
                "env must have at least one observation part and a positive action size".into(),
            )
            .into());
        }
        self.server.validate()?;
        if self.server.use_prioritized_buffer && !self.algo_name.supports_prioritized() {
            return Err(RlServerError::PrioritizedNotSupported(self.algo_name.to_string()).into());
        }
        if self.actor.lstm_network && !self.algo_name.supports_lstm_actor() {
            return Err(RlServerError::InvalidConfig(format!(
                "{} actor network does not support LSTM",
                self.algo_name
            ))
            .into());
        }
        Ok(())
    }

    /// Constructs [`ExperimentConfig`] from YAML file.
    ///
    /// Schedules are sorted and the configuration is validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let mut config: Self = serde_yaml::from_reader(rdr)?;
        config.actor_optim.sort();
        config.critic_optim.sort();
        config.training.sort();
        config.validate()?;
        Ok(config)
    }

    /// Saves [`ExperimentConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const YAML: &str = "
env:
  observation_shapes: [[8]]
  action_size: 2
algo_name: ddpg
server:
  use_prioritized_buffer: true
  n_step: 3
actor_optim:
  schedule:
    - limit: 0
      lr: 0.001
    - limit: 1000
      lr: 0.0005
algorithm:
  tau: 0.005
";

    fn write(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        let mut file = File::create(&path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load() -> Result<()> {
        let dir = TempDir::new("experiment_config")?;
        let config = ExperimentConfig::load(write(&dir, YAML))?;
        assert_eq!(config.algo_name, AlgoName::Ddpg);
        assert_eq!(config.server.n_step, 3);
        assert_eq!(config.server.batch_size, 96);
        assert_eq!(config.env.frame_skip, 1);
        assert_eq!(config.actor_optim.schedule[0].limit, 1000);
        assert_eq!(config.actor_optim.value_at(10), Some(0.001));
        assert_eq!(config.algorithm.get_f64("tau"), Some(0.005));
        assert!(!config.is_gym);
        assert_eq!(config.load_checkpoint, None);

        let shapes = config.get_env_shapes();
        assert_eq!(shapes.state_shapes, ObsShapes(vec![vec![3, 8]]));
        assert_eq!(shapes.action_size, 2);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("experiment_config")?;
        let config = ExperimentConfig::load(write(&dir, YAML))?;
        let path = dir.path().join("saved.yaml");
        config.save(&path)?;
        assert_eq!(ExperimentConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_required_fields() -> Result<()> {
        let dir = TempDir::new("experiment_config")?;
        assert!(ExperimentConfig::load(write(&dir, "algo_name: ddpg\n")).is_err());
        let no_algo = "env:\n  observation_shapes: [[8]]\n  action_size: 2\n";
        assert!(ExperimentConfig::load(write(&dir, no_algo)).is_err());
        Ok(())
    }

    #[test]
    fn test_prioritized_only_with_ddpg() {
        let env = EnvConfig {
            observation_shapes: ObsShapes::vector(4),
            action_size: 1,
            frame_skip: 1,
        };
        let server = ServerConfig::default().use_prioritized_buffer(true);
        let config = ExperimentConfig::new(env.clone(), AlgoName::Td3).server(server.clone());
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<RlServerError>(),
            Some(&RlServerError::PrioritizedNotSupported("td3".into()))
        );
        assert!(ExperimentConfig::new(env.clone(), AlgoName::Ddpg)
            .server(server)
            .validate()
            .is_ok());

        let lstm = NetworkConfig::default().lstm_network(true);
        assert!(ExperimentConfig::new(env.clone(), AlgoName::Sac)
            .actor(lstm.clone())
            .validate()
            .is_err());
        assert!(ExperimentConfig::new(env, AlgoName::Td3)
            .actor(lstm)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_algo_name() {
        assert_eq!("quantile_td3".parse::<AlgoName>(), Ok(AlgoName::QuantileTd3));
        assert_eq!(AlgoName::CategoricalDdpg.to_string(), "categorical_ddpg");
        assert!("ppo".parse::<AlgoName>().is_err());
    }
}
