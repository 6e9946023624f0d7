//! Experience replay of whole episodes with n-step returns and history stacking.
//!
//! * [`CircularHistoryBuffer`] stores observations, actions, rewards and
//!   episode-end flags in a ring.
//! * [`EpisodeTracker`] records where the stored episodes start and end.
//! * [`ReplayBuffer`] composes both and samples uniform batches.
//! * [`PrioritizedReplayBuffer`] adds a sum tree of priorities and
//!   importance-sampling weights.
//! * [`AgentBuffer`] is the per-episode staging buffer of an actor.
mod agent_buffer;
mod base;
mod batch;
mod config;
mod episode;
mod history;
mod prioritized;
mod tracker;
pub use agent_buffer::AgentBuffer;
pub use base::ReplayBuffer;
pub use batch::{Batch, BatchSpec, ObsBatch};
pub use config::{PerConfig, ReplayBufferConfig};
pub use episode::Episode;
pub use history::CircularHistoryBuffer;
pub use prioritized::{IwScheduler, PrioritizedReplayBuffer, WeightNormalizer};
pub use tracker::{EpisodeSpan, EpisodeTracker};

use crate::{ObsShapes, ReplayBufferBase};
use anyhow::Result;

/// Builds a uniform or a prioritized buffer according to `config`.
pub fn build_replay_buffer(
    config: &ReplayBufferConfig,
    shapes: ObsShapes,
    action_size: usize,
) -> Result<Box<dyn ReplayBufferBase + Send>> {
    let buffer: Box<dyn ReplayBufferBase + Send> = match &config.per_config {
        Some(per_config) => Box::new(PrioritizedReplayBuffer::new(
            config.capacity,
            shapes,
            action_size,
            config.seed,
            per_config,
        )?),
        None => Box::new(ReplayBuffer::build(config, shapes, action_size)),
    };
    Ok(buffer)
}
