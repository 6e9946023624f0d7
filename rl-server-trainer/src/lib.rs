#![warn(missing_docs)]
//! Training scheduler and actor loop of rl-server.
//!
//! [`RlTrainer`] owns the replay buffer and the [`Algorithm`](rl_server_core::Algorithm),
//! and decides when optimization steps run:
//!
//! * In synchronous mode, every call of [`RlTrainer::act`] may run steps
//!   inline, paced by the number of transitions pushed.
//! * In asynchronous mode, a background thread runs the steps while actors
//!   act concurrently.
//!
//! Actors reach the trainer through an [`RlClient`]:
//! * [`LocalClient`] acts with the trainer's algorithm.
//! * [`AgentModel`] acts with a local copy of the algorithm, refreshed with
//!   the published weights.
//!
//! Episodes are pushed directly or shipped through a channel with
//! [`EpisodeSender`] and applied by [`RlTrainer::spawn_episode_receiver`].
mod actor;
mod client;
mod episode_proxy;
mod error;
mod factory;
mod messages;
mod trainer;
pub use actor::{actor_stats_fmt, Actor, ActorConfig, ActorStat};
pub use client::{AgentModel, LocalClient, RlClient};
pub use episode_proxy::EpisodeSender;
pub use error::TrainerError;
pub use factory::{build_trainer, create_algorithm, AlgorithmBuilder};
pub use messages::EpisodeMessage;
pub use trainer::{RlTrainer, TrainerStat};
