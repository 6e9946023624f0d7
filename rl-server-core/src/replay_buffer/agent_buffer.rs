//! Per-episode staging buffer of an actor.
use super::{CircularHistoryBuffer, Episode, ObsBatch};
use crate::{error::RlServerError, ObsShapes};
use anyhow::Result;

/// Holds the episode an actor is currently running.
///
/// The buffer has room for `max_episode_len` transitions and provides the
/// history-stacked state the policy acts on. It is not shared between
/// threads.
pub struct AgentBuffer {
    history: CircularHistoryBuffer,
}

impl AgentBuffer {
    /// Creates a buffer for episodes of at most `max_episode_len` transitions.
    pub fn new(max_episode_len: usize, shapes: ObsShapes, action_size: usize) -> Self {
        Self {
            history: CircularHistoryBuffer::new(max_episode_len + 1, shapes, action_size),
        }
    }

    /// Number of transitions of the episode.
    pub fn len(&self) -> usize {
        self.history.len().saturating_sub(1)
    }

    /// Returns `true` if the episode has no transition.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the episode has ended.
    pub fn is_done(&self) -> bool {
        !self.history.is_empty() && self.history.is_done(self.history.pointer())
    }

    /// Sum of the rewards so far.
    pub fn total_reward(&self) -> f64 {
        (1..self.history.len()).map(|ix| self.history.reward(ix)).sum()
    }

    /// Starts the episode.
    pub fn push_init_observation(&mut self, obs: &[Vec<f32>]) -> Result<()> {
        if !self.history.is_empty() {
            return Err(RlServerError::MalformedEpisode(
                "initial observation pushed twice".to_string(),
            )
            .into());
        }
        self.history.push_observation(obs, 0)?;
        Ok(())
    }

    /// Appends a step.
    pub fn push_transition(
        &mut self,
        obs_next: &[Vec<f32>],
        act: &[f32],
        reward: f64,
        is_done: bool,
    ) -> Result<()> {
        if self.history.is_full() {
            return Err(RlServerError::EpisodeTooLong {
                len: self.history.capacity() + 1,
                capacity: self.history.capacity(),
            }
            .into());
        }
        self.history.push_transition(obs_next, act, reward, is_done)?;
        Ok(())
    }

    /// The last `history_len` observations, `[1, history_len, *shape]` per modality.
    pub fn get_current_state(&self, history_len: usize) -> Result<Vec<ObsBatch>> {
        let h = self.history.get_history(self.history.pointer(), history_len)?;
        Ok(h.into_iter().map(|b| ObsBatch::stack(&[b])).collect())
    }

    /// The complete episode.
    pub fn get_complete_episode(&self) -> Result<Episode> {
        if !self.is_done() {
            return Err(RlServerError::MalformedEpisode(
                "episode has not ended".to_string(),
            )
            .into());
        }
        let mut episode = Episode::new(self.history.observation(0));
        for ix in 1..self.history.len() {
            episode.push(
                self.history.observation(ix),
                self.history.action(ix).to_vec(),
                self.history.reward(ix),
                self.history.is_done(ix),
            );
        }
        Ok(episode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> AgentBuffer {
        AgentBuffer::new(3, ObsShapes::vector(2), 1)
    }

    #[test]
    fn test_current_state() {
        let mut b = buffer();
        b.push_init_observation(&[vec![0., 0.]]).unwrap();
        b.push_transition(&[vec![1., 1.]], &[0.1], 1.0, false).unwrap();
        let s = b.get_current_state(3).unwrap();
        assert_eq!(s[0].shape, vec![1, 3, 2]);
        assert_eq!(s[0].data, vec![0., 0., 0., 0., 1., 1.]);
    }

    #[test]
    fn test_complete_episode() {
        let mut b = buffer();
        b.push_init_observation(&[vec![0., 0.]]).unwrap();
        b.push_transition(&[vec![1., 1.]], &[0.1], 1.0, false).unwrap();
        assert!(b.get_complete_episode().is_err());
        b.push_transition(&[vec![2., 2.]], &[0.2], 2.0, true).unwrap();
        let e = b.get_complete_episode().unwrap();
        assert_eq!(e.len(), 2);
        assert_eq!(e.total_reward(), 3.0);
        assert_eq!(b.total_reward(), 3.0);
        assert_eq!(e.dones, vec![false, true]);
        assert_eq!(e.actions[1], vec![0.2]);
    }

    #[test]
    fn test_episode_longer_than_capacity() {
        let mut b = buffer();
        assert!(b.push_transition(&[vec![1., 1.]], &[0.], 0., false).is_err());
        b.push_init_observation(&[vec![0., 0.]]).unwrap();
        assert!(b.push_init_observation(&[vec![0., 0.]]).is_err());
        for _ in 0..3 {
            b.push_transition(&[vec![1., 1.]], &[0.], 0., false).unwrap();
        }
        assert_eq!(b.len(), 3);
        assert!(b.push_transition(&[vec![1., 1.]], &[0.], 0., false).is_err());
    }
}
