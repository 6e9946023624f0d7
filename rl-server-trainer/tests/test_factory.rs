mod common;
use anyhow::Result;
use common::*;
use rl_server_core::{
    config::{AlgoName, EnvConfig, ExperimentConfig, NetworkConfig},
    error::RlServerError,
    ObsShapes,
};
use rl_server_trainer::{build_trainer, create_algorithm, AlgorithmBuilder};
use std::sync::Mutex;
use tempdir::TempDir;
use test_log::test;

/// Records the name of each built algorithm.
#[derive(Default)]
struct MockBuilder {
    built: Mutex<Vec<String>>,
    counters: Counters,
}

impl MockBuilder {
    fn build(&self, name: &str, config: &ExperimentConfig) -> Result<MockAlgorithm> {
        self.built.lock().unwrap().push(name.to_string());
        Ok(MockAlgorithm::with_counters(
            config.env.action_size,
            self.counters.clone(),
        ))
    }

    fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

impl AlgorithmBuilder for MockBuilder {
    type Algo = MockAlgorithm;

    fn ddpg(&self, config: &ExperimentConfig, prioritized: bool) -> Result<MockAlgorithm> {
        let name = if prioritized { "prioritized_ddpg" } else { "ddpg" };
        self.build(name, config)
    }

    fn categorical_ddpg(&self, config: &ExperimentConfig) -> Result<MockAlgorithm> {
        self.build("categorical_ddpg", config)
    }

    fn quantile_ddpg(&self, config: &ExperimentConfig) -> Result<MockAlgorithm> {
        self.build("quantile_ddpg", config)
    }

    fn td3(&self, config: &ExperimentConfig) -> Result<MockAlgorithm> {
        self.build("td3", config)
    }

    fn quantile_td3(&self, config: &ExperimentConfig) -> Result<MockAlgorithm> {
        self.build("quantile_td3", config)
    }

    fn sac(&self, config: &ExperimentConfig) -> Result<MockAlgorithm> {
        self.build("sac", config)
    }
}

fn config(algo_name: AlgoName) -> ExperimentConfig {
    let env = EnvConfig {
        observation_shapes: ObsShapes::vector(2),
        action_size: 1,
        frame_skip: 1,
    };
    ExperimentConfig::new(env, algo_name)
}

#[test]
fn test_dispatch_by_name() -> Result<()> {
    let builder = MockBuilder::default();
    for name in &[
        AlgoName::Ddpg,
        AlgoName::CategoricalDdpg,
        AlgoName::QuantileDdpg,
        AlgoName::Td3,
        AlgoName::QuantileTd3,
        AlgoName::Sac,
    ] {
        create_algorithm(&config(*name), &builder)?;
    }
    assert_eq!(
        builder.built(),
        vec!["ddpg", "categorical_ddpg", "quantile_ddpg", "td3", "quantile_td3", "sac"]
    );
    Ok(())
}

#[test]
fn test_prioritized_ddpg() -> Result<()> {
    let builder = MockBuilder::default();
    let mut config = config(AlgoName::Ddpg);
    config.server.use_prioritized_buffer = true;
    create_algorithm(&config, &builder)?;
    assert_eq!(builder.built(), vec!["prioritized_ddpg"]);
    Ok(())
}

#[test]
fn test_prioritized_requires_ddpg() {
    let builder = MockBuilder::default();
    let mut config = config(AlgoName::Td3);
    config.server.use_prioritized_buffer = true;
    let err = create_algorithm(&config, &builder).unwrap_err();
    assert_eq!(
        err.downcast_ref::<RlServerError>(),
        Some(&RlServerError::PrioritizedNotSupported("td3".to_string()))
    );
    assert!(builder.built().is_empty());
}

#[test]
fn test_sac_rejects_lstm_actor() {
    let builder = MockBuilder::default();
    let config = config(AlgoName::Sac).actor(NetworkConfig::default().lstm_network(true));
    assert!(create_algorithm(&config, &builder).is_err());
    assert!(builder.built().is_empty());

    let config = config_with_lstm(AlgoName::Ddpg);
    assert!(create_algorithm(&config, &builder).is_ok());
}

fn config_with_lstm(algo_name: AlgoName) -> ExperimentConfig {
    config(algo_name).actor(NetworkConfig::default().lstm_network(true))
}

#[test]
fn test_build_trainer_loads_checkpoint() -> Result<()> {
    let dir = TempDir::new("factory")?;
    let builder = MockBuilder::default();
    let mut config = config(AlgoName::Td3);
    config.server = server_config(dir.path());
    config.load_checkpoint = Some(dir.path().join("model-100"));

    let trainer = build_trainer(&config, &builder)?;
    assert_eq!(builder.counters.loads(), 1);
    assert_eq!(trainer.action_size(), 1);
    assert_eq!(trainer.shapes(), &ObsShapes::vector(2));
    Ok(())
}
