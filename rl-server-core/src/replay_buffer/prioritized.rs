//! Prioritized experience replay.
mod iw_scheduler;
mod sum_tree;
use super::{
    base::AnchorChange, Batch, BatchSpec, Episode, PerConfig, ReplayBuffer,
};
use crate::{error::RlServerError, ExperienceBufferBase, ObsShapes, ReplayBufferBase};
use anyhow::Result;
pub use iw_scheduler::IwScheduler;
use sum_tree::SumTree;
pub use sum_tree::WeightNormalizer;

/// Replay buffer sampling transitions proportionally to `p^alpha`.
///
/// A slot gets the largest priority seen so far when it becomes an anchor,
/// and priority `0` when it stops being one, e.g. when it is overwritten.
/// Priorities are otherwise changed only by
/// [`update_td_errors`](PrioritizedReplayBuffer::update_td_errors).
pub struct PrioritizedReplayBuffer {
    base: ReplayBuffer,
    sum_tree: SumTree,
    eps: f64,
    normalize: WeightNormalizer,
}

impl PrioritizedReplayBuffer {
    /// Creates an empty buffer.
    ///
    /// Fails if `per_config` does not keep priorities positive.
    pub fn new(
        capacity: usize,
        shapes: ObsShapes,
        action_size: usize,
        seed: u64,
        per_config: &PerConfig,
    ) -> Result<Self> {
        per_config.validate()?;
        Ok(Self {
            base: ReplayBuffer::new(capacity, shapes, action_size, seed),
            sum_tree: SumTree::new(capacity, per_config.alpha),
            eps: per_config.eps,
            normalize: per_config.normalize,
        })
    }

    /// The underlying uniform buffer.
    pub fn base(&self) -> &ReplayBuffer {
        &self.base
    }

    /// Raw priority of slot `ix`.
    pub fn priority(&self, ix: usize) -> f64 {
        self.sum_tree.priority(ix)
    }

    /// Number of transitions pushed since construction.
    pub fn get_stored_in_buffer(&self) -> usize {
        self.base.get_stored_in_buffer()
    }

    /// Opens an episode with its initial observation.
    pub fn push_init_observation(&mut self, obs: &[Vec<f32>]) -> Result<()> {
        let Self { base, sum_tree, .. } = self;
        base.push_init_observation_with(obs, &mut |c| apply(sum_tree, c))
    }

    /// Appends a step to the open episode, closing it if `is_done`.
    pub fn push_transition(
        &mut self,
        obs_next: &[Vec<f32>],
        act: &[f32],
        reward: f64,
        is_done: bool,
    ) -> Result<()> {
        let Self { base, sum_tree, .. } = self;
        base.push_transition_with(obs_next, act, reward, is_done, &mut |c| {
            apply(sum_tree, c)
        })
    }

    /// Pushes a complete episode, entirely or not at all.
    pub fn push_episode(&mut self, episode: &Episode) -> Result<()> {
        let Self { base, sum_tree, .. } = self;
        base.push_episode_with(episode, &mut |c| apply(sum_tree, c))
    }

    /// Samples a batch of n-step transitions with importance-sampling weights.
    pub fn get_prioritized_batch(
        &mut self,
        batch_size: usize,
        history_len: usize,
        n_step: usize,
        gamma: f64,
        beta: f64,
    ) -> Result<Batch> {
        let spec = BatchSpec::new(batch_size, history_len, n_step, gamma).beta(beta);
        self.base.check_ready(&spec)?;
        if self.sum_tree.n_positive() == 0 {
            return Err(RlServerError::NoValidAnchor.into());
        }
        let (ixs, ws) =
            self.sum_tree
                .sample(batch_size, beta, self.normalize, self.base.rng_mut());
        let mut batch = self.base.assemble(ixs, &spec);
        batch.weight = Some(ws);
        Ok(batch)
    }

    /// Sets the priorities of sampled slots to `|td| + eps`.
    ///
    /// Slots which stopped being anchors since they were sampled are skipped.
    pub fn update_td_errors(&mut self, ixs: &[usize], td_errs: &[f64]) {
        debug_assert_eq!(ixs.len(), td_errs.len());
        for (&ix, &td) in ixs.iter().zip(td_errs.iter()) {
            if self.base.history().is_anchor(ix) {
                let p = (td.abs() + self.eps).max(self.eps);
                self.sum_tree.set(ix, p);
            }
        }
    }
}

fn apply(sum_tree: &mut SumTree, change: AnchorChange) {
    let p = if change.is_anchor {
        sum_tree.max_priority()
    } else {
        0.
    };
    sum_tree.set(change.slot, p);
}

impl ExperienceBufferBase for PrioritizedReplayBuffer {
    type Item = Episode;

    fn push(&mut self, episode: Episode) -> Result<()> {
        self.push_episode(&episode)
    }

    fn len(&self) -> usize {
        self.base.len()
    }
}

impl ReplayBufferBase for PrioritizedReplayBuffer {
    fn get_stored_in_buffer(&self) -> usize {
        self.base.get_stored_in_buffer()
    }

    fn batch(&mut self, spec: &BatchSpec) -> Result<Batch> {
        self.get_prioritized_batch(
            spec.batch_size,
            spec.history_len,
            spec.n_step,
            spec.gamma,
            spec.beta,
        )
    }

    fn update_td_errors(&mut self, ixs: &[usize], td_errs: &[f64]) {
        PrioritizedReplayBuffer::update_td_errors(self, ixs, td_errs)
    }

    fn is_prioritized(&self) -> bool {
        true
    }
}
