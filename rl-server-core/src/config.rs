//! Configuration of experiments.
//!
//! An experiment is described by a single YAML file deserialized into
//! [`ExperimentConfig`]. Every field except `env` and `algo_name` has a
//! default. [`ExperimentConfig::load`] validates the configuration, so a
//! loaded configuration is usable as is.
mod experiment;
mod network;
mod schedule;
mod server;
pub use experiment::{AlgoName, AlgorithmConfig, EnvConfig, EnvShapes, ExperimentConfig};
pub use network::NetworkConfig;
pub use schedule::{Schedule, ScheduleEntry};
pub use server::ServerConfig;
