//! Ring storage of observations, actions, rewards and episode-end flags.
use super::ObsBatch;
use crate::{error::RlServerError, ObsShapes, Observation};
use anyhow::Result;

/// Fixed-capacity ring storage of transitions.
///
/// Slot `s` of an episode holds the observation `o_k` together with the
/// action, reward and done flag of the step that produced it. The first slot
/// of an episode holds the initial observation with a zero action, a zero
/// reward and `done = false`.
///
/// Slots are addressed modulo the capacity. Once the storage is full the
/// oldest slot is overwritten, so callers must not keep slot indices for
/// long. Every slot also records the id of its episode and its step within
/// the episode, so history windows never cross an episode boundary.
pub struct CircularHistoryBuffer {
    capacity: usize,
    shapes: ObsShapes,
    obs_sizes: Vec<usize>,
    action_size: usize,
    obs: Vec<Vec<f32>>,
    act: Vec<f32>,
    reward: Vec<f64>,
    is_done: Vec<bool>,
    episode_id: Vec<u64>,
    episode_step: Vec<usize>,
    pointer: usize,
    n_advances: usize,
    written: bool,
}

impl CircularHistoryBuffer {
    /// Creates an empty storage.
    pub fn new(capacity: usize, shapes: ObsShapes, action_size: usize) -> Self {
        assert!(capacity > 1, "capacity must be larger than 1");
        let obs_sizes = shapes.sizes();
        Self {
            capacity,
            obs: obs_sizes.iter().map(|n| vec![0f32; n * capacity]).collect(),
            obs_sizes,
            shapes,
            action_size,
            act: vec![0f32; action_size * capacity],
            reward: vec![0.; capacity],
            is_done: vec![false; capacity],
            episode_id: vec![0; capacity],
            episode_step: vec![0; capacity],
            pointer: 0,
            n_advances: 0,
            written: false,
        }
    }

    /// Capacity of the storage.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shapes of the observation modalities.
    pub fn shapes(&self) -> &ObsShapes {
        &self.shapes
    }

    /// Dimension of actions.
    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Slot written last.
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Number of occupied slots, at most the capacity.
    pub fn len(&self) -> usize {
        if self.written {
            (self.n_advances + 1).min(self.capacity)
        } else {
            0
        }
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        !self.written
    }

    /// Returns `true` if every slot has been written at least once.
    pub fn is_full(&self) -> bool {
        self.written && self.n_advances + 1 >= self.capacity
    }

    /// Returns `true` if slot `ix` holds data.
    pub fn is_written(&self, ix: usize) -> bool {
        ix < self.capacity && self.written && (self.is_full() || ix <= self.pointer)
    }

    #[inline]
    pub(crate) fn next(&self, ix: usize) -> usize {
        (ix + 1) % self.capacity
    }

    #[inline]
    pub(crate) fn prev(&self, ix: usize) -> usize {
        (ix + self.capacity - 1) % self.capacity
    }

    /// Writes the initial observation of an episode at the current slot.
    ///
    /// The pointer is not advanced.
    pub fn push_observation(&mut self, obs: &[Vec<f32>], episode_id: u64) -> Result<usize> {
        self.shapes.check(obs)?;
        let ix = self.pointer;
        self.write(ix, obs, None, 0., false, episode_id, 0);
        self.written = true;
        Ok(ix)
    }

    /// Advances the pointer and writes the next observation with the action,
    /// reward and done flag of the step that produced it.
    pub fn push_transition(
        &mut self,
        obs_next: &[Vec<f32>],
        act: &[f32],
        reward: f64,
        is_done: bool,
    ) -> Result<usize> {
        if !self.written || self.is_done[self.pointer] {
            return Err(RlServerError::EpisodeNotOpen.into());
        }
        self.shapes.check(obs_next)?;
        if act.len() != self.action_size {
            return Err(RlServerError::ShapeMismatch(format!(
                "action has {} elements, expected {}",
                act.len(),
                self.action_size
            ))
            .into());
        }

        let episode_id = self.episode_id[self.pointer];
        let step = self.episode_step[self.pointer] + 1;
        self.advance();
        let ix = self.pointer;
        self.write(ix, obs_next, Some(act), reward, is_done, episode_id, step);
        Ok(ix)
    }

    /// Moves the pointer to the next slot.
    pub(crate) fn advance(&mut self) {
        self.pointer = self.next(self.pointer);
        self.n_advances += 1;
    }

    fn write(
        &mut self,
        ix: usize,
        obs: &[Vec<f32>],
        act: Option<&[f32]>,
        reward: f64,
        is_done: bool,
        episode_id: u64,
        step: usize,
    ) {
        for (m, part) in obs.iter().enumerate() {
            let n = self.obs_sizes[m];
            self.obs[m][ix * n..(ix + 1) * n].copy_from_slice(part);
        }
        let a = &mut self.act[ix * self.action_size..(ix + 1) * self.action_size];
        match act {
            Some(act) => a.copy_from_slice(act),
            None => a.iter_mut().for_each(|v| *v = 0.),
        }
        self.reward[ix] = reward;
        self.is_done[ix] = is_done;
        self.episode_id[ix] = episode_id;
        self.episode_step[ix] = step;
    }

    /// The slot holding the step before `ix` in the same episode, if still stored.
    pub fn predecessor(&self, ix: usize) -> Option<usize> {
        if self.episode_step[ix] == 0 {
            return None;
        }
        let p = self.prev(ix);
        let same = self.is_written(p)
            && self.episode_id[p] == self.episode_id[ix]
            && self.episode_step[p] + 1 == self.episode_step[ix];
        if same {
            Some(p)
        } else {
            None
        }
    }

    /// The slot holding the step after `ix` in the same episode, if written.
    pub fn successor(&self, ix: usize) -> Option<usize> {
        if ix == self.pointer {
            return None;
        }
        let n = self.next(ix);
        let same = self.is_written(n)
            && self.episode_id[n] == self.episode_id[ix]
            && self.episode_step[n] == self.episode_step[ix] + 1;
        if same {
            Some(n)
        } else {
            None
        }
    }

    /// Returns `true` if a transition starts at slot `ix`.
    pub fn is_anchor(&self, ix: usize) -> bool {
        self.is_written(ix) && !self.is_done[ix] && self.successor(ix).is_some()
    }

    /// Slots of the `length` most recent observations ending at `end`, oldest first.
    ///
    /// The window stops at the first slot of the episode, or at the earliest
    /// slot of the episode still stored, and is left-padded by repeating
    /// that slot.
    pub fn history_slots(&self, end: usize, length: usize) -> Vec<usize> {
        let mut slots = Vec::with_capacity(length);
        let mut j = end;
        slots.push(j);
        while slots.len() < length {
            match self.predecessor(j) {
                Some(p) => {
                    j = p;
                    slots.push(p);
                }
                None => break,
            }
        }
        slots.resize(length.max(1), j);
        slots.reverse();
        slots
    }

    /// Returns the `length` most recent observations ending at `end`,
    /// `[length, *shape]` per modality.
    pub fn get_history(&self, end: usize, length: usize) -> Result<Vec<ObsBatch>> {
        if !self.is_written(end) {
            return Err(RlServerError::SlotNotWritten(end).into());
        }
        let slots = self.history_slots(end, length);
        Ok((0..self.shapes.n_parts())
            .map(|m| {
                let mut b = ObsBatch::empty(self.shapes.part(m));
                slots.iter().for_each(|&s| b.push_row(self.obs_part(s, m)));
                b
            })
            .collect())
    }

    /// The `m`-th modality of the observation at slot `ix`.
    pub fn obs_part(&self, ix: usize, m: usize) -> &[f32] {
        let n = self.obs_sizes[m];
        &self.obs[m][ix * n..(ix + 1) * n]
    }

    /// The observation at slot `ix`.
    pub fn observation(&self, ix: usize) -> Observation {
        (0..self.shapes.n_parts())
            .map(|m| self.obs_part(ix, m).to_vec())
            .collect()
    }

    /// The action of the step that produced slot `ix`.
    pub fn action(&self, ix: usize) -> &[f32] {
        &self.act[ix * self.action_size..(ix + 1) * self.action_size]
    }

    /// The reward of the step that produced slot `ix`.
    pub fn reward(&self, ix: usize) -> f64 {
        self.reward[ix]
    }

    /// Returns `true` if slot `ix` ends an episode.
    pub fn is_done(&self, ix: usize) -> bool {
        self.is_done[ix]
    }

    /// Id of the episode of slot `ix`.
    pub fn episode_id(&self, ix: usize) -> u64 {
        self.episode_id[ix]
    }

    /// Step of slot `ix` within its episode.
    pub fn episode_step(&self, ix: usize) -> usize {
        self.episode_step[ix]
    }
}
