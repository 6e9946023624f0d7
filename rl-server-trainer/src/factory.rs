//! Construction of algorithms and trainers from an [`ExperimentConfig`].
use crate::RlTrainer;
use anyhow::Result;
use log::info;
use rl_server_core::{
    config::{AlgoName, ExperimentConfig},
    Algorithm,
};

/// Builds the algorithms of a family of actor/critic methods.
///
/// Implementations own the network and optimizer code. Each method is
/// called at most once, at startup, with a validated configuration.
pub trait AlgorithmBuilder {
    /// The algorithm built.
    type Algo: Algorithm;

    /// Builds DDPG, in its prioritized form if `prioritized`.
    fn ddpg(&self, config: &ExperimentConfig, prioritized: bool) -> Result<Self::Algo>;

    /// Builds DDPG with a categorical critic.
    fn categorical_ddpg(&self, config: &ExperimentConfig) -> Result<Self::Algo>;

    /// Builds DDPG with a quantile critic.
    fn quantile_ddpg(&self, config: &ExperimentConfig) -> Result<Self::Algo>;

    /// Builds TD3.
    fn td3(&self, config: &ExperimentConfig) -> Result<Self::Algo>;

    /// Builds TD3 with quantile critics.
    fn quantile_td3(&self, config: &ExperimentConfig) -> Result<Self::Algo>;

    /// Builds SAC.
    fn sac(&self, config: &ExperimentConfig) -> Result<Self::Algo>;
}

/// Validates `config` and builds the algorithm it names.
///
/// Prioritized replay with an algorithm other than DDPG, or a recurrent
/// SAC actor, is an error.
pub fn create_algorithm<B: AlgorithmBuilder>(config: &ExperimentConfig, builder: &B) -> Result<B::Algo> {
    config.validate()?;
    info!("--- creating {}", config.algo_name);
    match config.algo_name {
        AlgoName::Ddpg => builder.ddpg(config, config.server.use_prioritized_buffer),
        AlgoName::CategoricalDdpg => builder.categorical_ddpg(config),
        AlgoName::QuantileDdpg => builder.quantile_ddpg(config),
        AlgoName::Td3 => builder.td3(config),
        AlgoName::QuantileTd3 => builder.quantile_td3(config),
        AlgoName::Sac => builder.sac(config),
    }
}

/// Builds the algorithm named by `config` and a trainer around it.
///
/// The parameters in `load_checkpoint` are loaded if given.
pub fn build_trainer<B: AlgorithmBuilder>(
    config: &ExperimentConfig,
    builder: &B,
) -> Result<RlTrainer<B::Algo>> {
    let mut algo = create_algorithm(config, builder)?;
    if let Some(path) = &config.load_checkpoint {
        algo.load_params(path)?;
        info!("Loaded the model from {:?}", path);
    }
    let shapes = config.get_env_shapes();
    RlTrainer::build(&config.server, shapes.observation_shapes, shapes.action_size, algo)
}
