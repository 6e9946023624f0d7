//! Replay buffer interface.
use crate::replay_buffer::{Batch, BatchSpec, Episode};
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of occupied slots in the buffer.
    fn len(&self) -> usize;
}

/// Interface for replay buffers that generate batches for training.
///
/// Items are whole [`Episode`]s: an episode is applied completely or not at all.
pub trait ReplayBufferBase: ExperienceBufferBase<Item = Episode> {
    /// Cumulative number of transitions pushed since construction.
    fn get_stored_in_buffer(&self) -> usize;

    /// Constructs a batch of experiences for training.
    fn batch(&mut self, spec: &BatchSpec) -> Result<Batch>;

    /// Updates the priorities of the sampled transitions.
    ///
    /// Does nothing for buffers without priorities.
    fn update_td_errors(&mut self, ixs: &[usize], td_errs: &[f64]);

    /// Returns `true` if batches are sampled according to priorities.
    fn is_prioritized(&self) -> bool {
        false
    }
}
