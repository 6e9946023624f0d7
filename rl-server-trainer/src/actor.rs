//! Runs episodes in an environment and ships them to the trainer.
mod base;
mod config;
mod stat;
pub use base::Actor;
pub use config::ActorConfig;
pub use stat::{actor_stats_fmt, ActorStat};
