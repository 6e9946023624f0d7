//! Replay buffer with uniform sampling.
use super::{
    Batch, BatchSpec, CircularHistoryBuffer, Episode, EpisodeTracker, ObsBatch,
    ReplayBufferConfig,
};
use crate::{
    error::RlServerError, ExperienceBufferBase, ObsShapes, Observation, ReplayBufferBase,
};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A slot which became, or stopped being, the anchor of a transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AnchorChange {
    pub slot: usize,
    pub is_anchor: bool,
}

/// Server-side replay buffer.
///
/// Episodes are stored in a [`CircularHistoryBuffer`]. An episode is opened
/// by [`push_init_observation`], extended by [`push_transition`] and closed
/// by a transition with `is_done = true`. Episodes assembled by actors are
/// pushed as a unit with [`push_episode`].
///
/// A slot is an *anchor* when the next slot holds the following step of the
/// same episode. Batches are built from anchors drawn uniformly at random.
///
/// [`push_init_observation`]: ReplayBuffer::push_init_observation
/// [`push_transition`]: ReplayBuffer::push_transition
/// [`push_episode`]: ReplayBuffer::push_episode
pub struct ReplayBuffer {
    history: CircularHistoryBuffer,
    episodes: EpisodeTracker,

    /// Number of transitions pushed since construction.
    stored_in_buffer: usize,

    /// Number of slots which are anchors.
    n_anchors: usize,

    rng: StdRng,
}

impl ReplayBuffer {
    /// Creates an empty buffer.
    pub fn new(capacity: usize, shapes: ObsShapes, action_size: usize, seed: u64) -> Self {
        Self {
            history: CircularHistoryBuffer::new(capacity, shapes, action_size),
            episodes: EpisodeTracker::new(),
            stored_in_buffer: 0,
            n_anchors: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates an empty buffer from a configuration, ignoring `per_config`.
    pub fn build(config: &ReplayBufferConfig, shapes: ObsShapes, action_size: usize) -> Self {
        Self::new(config.capacity, shapes, action_size, config.seed)
    }

    /// The ring storage.
    pub fn history(&self) -> &CircularHistoryBuffer {
        &self.history
    }

    /// The closed episodes still stored.
    pub fn episodes(&self) -> &EpisodeTracker {
        &self.episodes
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns `true` if nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of transitions pushed since construction.
    pub fn get_stored_in_buffer(&self) -> usize {
        self.stored_in_buffer
    }

    /// Number of slots from which a transition can be sampled.
    pub fn n_anchors(&self) -> usize {
        self.n_anchors
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Opens an episode with its initial observation.
    pub fn push_init_observation(&mut self, obs: &[Vec<f32>]) -> Result<()> {
        self.push_init_observation_with(obs, &mut |_| {})
    }

    /// Appends a step to the open episode, closing it if `is_done`.
    pub fn push_transition(
        &mut self,
        obs_next: &[Vec<f32>],
        act: &[f32],
        reward: f64,
        is_done: bool,
    ) -> Result<()> {
        self.push_transition_with(obs_next, act, reward, is_done, &mut |_| {})
    }

    /// Pushes a complete episode.
    ///
    /// The episode is checked before anything is written, so it is stored
    /// entirely or not at all.
    pub fn push_episode(&mut self, episode: &Episode) -> Result<()> {
        self.push_episode_with(episode, &mut |_| {})
    }

    pub(crate) fn push_episode_with(
        &mut self,
        episode: &Episode,
        on_change: &mut impl FnMut(AnchorChange),
    ) -> Result<()> {
        episode.check(self.history.shapes(), self.history.action_size())?;
        let n_slots = episode.len() + 1;
        if n_slots > self.history.capacity() {
            return Err(RlServerError::EpisodeTooLong {
                len: n_slots,
                capacity: self.history.capacity(),
            }
            .into());
        }

        self.push_init_observation_with(&episode.observations[0], on_change)?;
        for k in 0..episode.len() {
            self.push_transition_with(
                &episode.observations[k + 1],
                &episode.actions[k],
                episode.rewards[k],
                episode.dones[k],
                on_change,
            )?;
        }
        Ok(())
    }

    pub(crate) fn push_init_observation_with(
        &mut self,
        obs: &[Vec<f32>],
        on_change: &mut impl FnMut(AnchorChange),
    ) -> Result<()> {
        self.history.shapes().check(obs)?;
        let ix = if self.history.is_empty() {
            self.history.pointer()
        } else {
            self.history.next(self.history.pointer())
        };
        let before = self.anchor_status(ix);
        if !self.history.is_empty() {
            self.history.advance();
        }
        let id = self.episodes.open(ix);
        self.history.push_observation(obs, id)?;
        self.after_write(before, on_change);
        Ok(())
    }

    pub(crate) fn push_transition_with(
        &mut self,
        obs_next: &[Vec<f32>],
        act: &[f32],
        reward: f64,
        is_done: bool,
        on_change: &mut impl FnMut(AnchorChange),
    ) -> Result<()> {
        let span = *self
            .episodes
            .open_span()
            .ok_or(RlServerError::EpisodeNotOpen)?;
        if span.len + 2 > self.history.capacity() {
            return Err(RlServerError::EpisodeTooLong {
                len: span.len + 2,
                capacity: self.history.capacity(),
            }
            .into());
        }

        let ix = self.history.next(self.history.pointer());
        let before = self.anchor_status(ix);
        self.history.push_transition(obs_next, act, reward, is_done)?;
        self.episodes.extend();
        self.stored_in_buffer += 1;
        self.after_write(before, on_change);
        if is_done {
            self.episodes.close();
        }
        Ok(())
    }

    /// Anchor status of the slots affected by a write at `ix`.
    fn anchor_status(&self, ix: usize) -> [(usize, bool); 2] {
        let p = self.history.prev(ix);
        [
            (p, self.history.is_anchor(p)),
            (ix, self.history.is_anchor(ix)),
        ]
    }

    fn after_write(
        &mut self,
        before: [(usize, bool); 2],
        on_change: &mut impl FnMut(AnchorChange),
    ) {
        for &(slot, was_anchor) in before.iter() {
            let is_anchor = self.history.is_anchor(slot);
            if is_anchor != was_anchor {
                if is_anchor {
                    self.n_anchors += 1;
                } else {
                    self.n_anchors -= 1;
                }
                on_change(AnchorChange { slot, is_anchor });
            }
        }
        self.episodes.evict(&self.history);
    }

    /// History-stacked state ending at slot `ix`, `[history_len, *shape]` per modality.
    pub fn get_state(&self, ix: usize, history_len: usize) -> Result<Vec<ObsBatch>> {
        self.history.get_history(ix, history_len)
    }

    /// Reassembles the `k`-th oldest complete episode still stored.
    pub fn episode(&self, k: usize) -> Option<Episode> {
        let span = self.episodes.get(k)?;
        let mut ix = span.start;
        let mut episode = Episode::new(self.history.observation(ix));
        for _ in 0..span.len {
            ix = self.history.next(ix);
            episode.push(
                self.history.observation(ix),
                self.history.action(ix).to_vec(),
                self.history.reward(ix),
                self.history.is_done(ix),
            );
        }
        Some(episode)
    }

    /// Fails if a batch cannot be sampled with `spec`.
    pub(crate) fn check_ready(&self, spec: &BatchSpec) -> Result<()> {
        if spec.history_len == 0 || spec.n_step == 0 {
            return Err(RlServerError::InvalidConfig(format!(
                "history_len and n_step must be positive, got {} and {}",
                spec.history_len, spec.n_step
            ))
            .into());
        }
        let required = spec.history_len + spec.n_step;
        if self.len() <= required {
            return Err(RlServerError::NotReady {
                stored: self.len(),
                required,
            }
            .into());
        }
        if self.n_anchors == 0 {
            return Err(RlServerError::NoValidAnchor.into());
        }
        Ok(())
    }

    /// Draws anchors uniformly at random.
    fn sample_anchors(&mut self, batch_size: usize) -> Vec<usize> {
        let len = self.len();
        (0..batch_size)
            .map(|_| loop {
                let ix = self.rng.gen_range(0..len);
                if self.history.is_anchor(ix) {
                    break ix;
                }
            })
            .collect()
    }

    /// Samples a batch of n-step transitions uniformly.
    pub fn get_batch(
        &mut self,
        batch_size: usize,
        history_len: usize,
        n_step: usize,
        gamma: f64,
    ) -> Result<Batch> {
        let spec = BatchSpec::new(batch_size, history_len, n_step, gamma);
        self.check_ready(&spec)?;
        let ixs = self.sample_anchors(batch_size);
        Ok(self.assemble(ixs, &spec))
    }

    fn push_history(&self, end: usize, history_len: usize, out: &mut [ObsBatch]) {
        let slots = self.history.history_slots(end, history_len);
        for (m, b) in out.iter_mut().enumerate() {
            let row = slots
                .iter()
                .flat_map(|&s| self.history.obs_part(s, m).iter().cloned())
                .collect::<Vec<_>>();
            b.push_row(&row);
        }
    }

    /// Builds the batch for the given anchors.
    ///
    /// The n-step window of an anchor stops at the first terminal slot, at
    /// the newest slot of an open episode, or after `n_step` steps.
    pub(crate) fn assemble(&self, ixs: Vec<usize>, spec: &BatchSpec) -> Batch {
        let shapes = self.history.shapes().stacked(spec.history_len);
        let new_obs = || -> Vec<ObsBatch> {
            shapes.0.iter().map(|s| ObsBatch::empty(s)).collect()
        };
        let n = ixs.len();
        let mut batch = Batch {
            obs: new_obs(),
            act: ObsBatch::empty(&[self.history.action_size()]),
            reward: Vec::with_capacity(n),
            n_step_return: Vec::with_capacity(n),
            next_obs: new_obs(),
            is_terminated: Vec::with_capacity(n),
            horizon: Vec::with_capacity(n),
            discount: Vec::with_capacity(n),
            ix_sample: vec![],
            weight: None,
        };

        for &t in ixs.iter() {
            let mut ret = 0.;
            let mut discount = 1.;
            let mut last = t;
            let mut k = 0;
            let mut is_terminated = false;
            while k < spec.n_step {
                match self.history.successor(last) {
                    Some(s) => {
                        ret += discount * self.history.reward(s);
                        discount *= spec.gamma;
                        last = s;
                        k += 1;
                        if self.history.is_done(s) {
                            is_terminated = true;
                            break;
                        }
                    }
                    None => break,
                }
            }
            debug_assert!(k > 0, "slot {} is not an anchor", t);

            let first = self.history.next(t);
            self.push_history(t, spec.history_len, &mut batch.obs);
            batch.act.push_row(self.history.action(first));
            batch.reward.push(self.history.reward(first));
            batch.n_step_return.push(ret);
            self.push_history(last, spec.history_len, &mut batch.next_obs);
            batch.is_terminated.push(is_terminated);
            batch.horizon.push(k);
            batch.discount.push(discount);
        }
        batch.ix_sample = ixs;
        batch
    }

    /// The most recent observation.
    pub fn last_observation(&self) -> Option<Observation> {
        if self.is_empty() {
            None
        } else {
            Some(self.history.observation(self.history.pointer()))
        }
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = Episode;

    fn push(&mut self, episode: Episode) -> Result<()> {
        self.push_episode(&episode)
    }

    fn len(&self) -> usize {
        self.history.len()
    }
}

impl ReplayBufferBase for ReplayBuffer {
    fn get_stored_in_buffer(&self) -> usize {
        self.stored_in_buffer
    }

    fn batch(&mut self, spec: &BatchSpec) -> Result<Batch> {
        self.get_batch(spec.batch_size, spec.history_len, spec.n_step, spec.gamma)
    }

    fn update_td_errors(&mut self, _ixs: &[usize], _td_errs: &[f64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode_with_rewards(rewards: &[f64]) -> Episode {
        let mut e = Episode::new(vec![vec![0.]]);
        for (k, &r) in rewards.iter().enumerate() {
            let v = (k + 1) as f32;
            e.push(vec![vec![v]], vec![v], r, k + 1 == rewards.len());
        }
        e
    }

    fn buffer(capacity: usize) -> ReplayBuffer {
        ReplayBuffer::new(capacity, ObsShapes::vector(1), 1, 42)
    }

    #[test]
    fn test_n_step_return_mid_episode() {
        let mut b = buffer(32);
        b.push_episode(&episode_with_rewards(&[1., 1., 1., 1., 1.]))
            .unwrap();
        let spec = BatchSpec::new(1, 1, 3, 0.9);
        let batch = b.assemble(vec![0], &spec);
        assert!((batch.n_step_return[0] - 2.71).abs() < 1e-9);
        assert_eq!(batch.horizon[0], 3);
        assert!((batch.discount[0] - 0.729).abs() < 1e-9);
        assert!(!batch.is_terminated[0]);
        assert_eq!(batch.next_obs[0].data, vec![3.]);
        assert_eq!(batch.act.data, vec![1.]);
        assert_eq!(batch.obs[0].data, vec![0.]);
    }

    #[test]
    fn test_n_step_return_truncated_at_episode_end() {
        let mut b = buffer(32);
        b.push_episode(&episode_with_rewards(&[1., 1.])).unwrap();
        let spec = BatchSpec::new(1, 1, 3, 1.0);
        let batch = b.assemble(vec![0], &spec);
        assert_eq!(batch.n_step_return[0], 2.);
        assert!(batch.is_terminated[0]);
        assert_eq!(batch.horizon[0], 2);
        assert_eq!(batch.next_obs[0].data, vec![2.]);
    }

    #[test]
    fn test_n_step_window_stops_at_open_episode_end() {
        let mut b = buffer(32);
        b.push_init_observation(&[vec![0.]]).unwrap();
        b.push_transition(&[vec![1.]], &[0.], 1., false).unwrap();
        b.push_transition(&[vec![2.]], &[0.], 1., false).unwrap();
        let batch = b.assemble(vec![0], &BatchSpec::new(1, 1, 5, 0.5));
        assert_eq!(batch.n_step_return[0], 1.5);
        assert_eq!(batch.horizon[0], 2);
        assert!(!batch.is_terminated[0]);
    }

    #[test]
    fn test_push_same_episode_twice() {
        let mut b = buffer(64);
        let e = episode_with_rewards(&[1., 2., 3., 4.]);
        b.push_episode(&e).unwrap();
        b.push_episode(&e).unwrap();
        assert_eq!(b.get_stored_in_buffer(), 2 * e.len());
        assert_eq!(b.len(), 2 * (e.len() + 1));
        assert_eq!(b.episodes().len(), 2);
        assert_eq!(b.n_anchors(), 2 * e.len());
        assert_eq!(b.episode(0), Some(e.clone()));
        assert_eq!(b.episode(1), Some(e));
    }

    #[test]
    fn test_malformed_episode_is_not_applied() {
        let mut b = buffer(64);
        let mut e = episode_with_rewards(&[1., 2., 3.]);
        e.dones[0] = true;
        assert!(b.push_episode(&e).is_err());
        assert!(b.is_empty());
        assert_eq!(b.get_stored_in_buffer(), 0);

        let long = episode_with_rewards(&vec![0.; 64]);
        assert!(b.push_episode(&long).is_err());
        assert!(b.is_empty());
    }

    #[test]
    fn test_episode_state_machine() {
        let mut b = buffer(16);
        assert!(b.push_transition(&[vec![1.]], &[0.], 0., false).is_err());
        b.push_init_observation(&[vec![0.]]).unwrap();
        b.push_transition(&[vec![1.]], &[0.], 0., true).unwrap();
        assert!(b.push_transition(&[vec![2.]], &[0.], 0., false).is_err());
        assert_eq!(b.episodes().len(), 1);
    }

    #[test]
    fn test_sampling_before_ready_fails() {
        let mut b = buffer(16);
        assert!(b.get_batch(4, 1, 1, 0.99).is_err());
        b.push_episode(&episode_with_rewards(&[1.])).unwrap();
        assert!(b.get_batch(4, 1, 1, 0.99).is_err());
        b.push_episode(&episode_with_rewards(&[1.])).unwrap();
        assert!(b.get_batch(4, 1, 1, 0.99).is_ok());
    }

    #[test]
    fn test_uniform_sampling_returns_anchors_only() {
        let mut b = buffer(20);
        for len in [3, 5, 2, 6, 4, 7].iter() {
            b.push_episode(&episode_with_rewards(&vec![1.; *len])).unwrap();
        }
        let batch = b.get_batch(500, 3, 2, 0.99).unwrap();
        assert_eq!(batch.len(), 500);
        for (i, &ix) in batch.ix_sample.iter().enumerate() {
            assert!(b.history().is_anchor(ix));
            let id = b.history().episode_id(ix);
            assert!(b
                .history()
                .history_slots(ix, 3)
                .iter()
                .all(|&s| b.history().episode_id(s) == id));
            assert_eq!(batch.reward[i], 1.);
        }
        assert_eq!(batch.obs[0].shape, vec![500, 3, 1]);
    }

    #[test]
    fn test_anchor_count_after_wrap() {
        let mut b = buffer(10);
        for _ in 0..7 {
            b.push_episode(&episode_with_rewards(&[1., 1., 1.])).unwrap();
            let n = (0..b.len()).filter(|&ix| b.history().is_anchor(ix)).count();
            assert_eq!(n, b.n_anchors());
        }
        assert!(b.episodes().iter().all(|span| span.len == 3));
        assert!(b.episodes().len() <= 2);
    }
}
