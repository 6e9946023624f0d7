//! Complete episodes exchanged between actors and the trainer.
use crate::{error::RlServerError, ObsShapes, Observation};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// An episode assembled on the actor side.
///
/// `observations` has one more element than the other fields: it starts
/// with the initial observation, and `observations[k + 1]` is the outcome of
/// `actions[k]`. `dones` is `true` exactly at the last step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Observations, including the initial one.
    pub observations: Vec<Observation>,

    /// Actions taken.
    pub actions: Vec<Vec<f32>>,

    /// Rewards of the steps.
    pub rewards: Vec<f64>,

    /// Episode-end flags of the steps.
    pub dones: Vec<bool>,

    /// Id of the actor which collected the episode. Informational only.
    #[serde(default)]
    pub agent_id: Option<usize>,

    /// Index of the episode in its actor. Informational only.
    #[serde(default)]
    pub episode_index: Option<usize>,
}

impl Episode {
    /// Starts an episode from its initial observation.
    pub fn new(init_obs: Observation) -> Self {
        Self {
            observations: vec![init_obs],
            actions: vec![],
            rewards: vec![],
            dones: vec![],
            agent_id: None,
            episode_index: None,
        }
    }

    /// Appends a step.
    pub fn push(&mut self, obs_next: Observation, act: Vec<f32>, reward: f64, is_done: bool) {
        self.observations.push(obs_next);
        self.actions.push(act);
        self.rewards.push(reward);
        self.dones.push(is_done);
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if the episode has no transition.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sum of the rewards.
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Checks the invariants of a complete episode.
    pub fn check(&self, shapes: &ObsShapes, action_size: usize) -> Result<()> {
        let malformed = |msg: String| -> Result<()> { Err(RlServerError::MalformedEpisode(msg).into()) };
        let len = self.len();
        if len == 0 {
            return malformed("no transition".to_string());
        }
        if self.observations.len() != len + 1 || self.rewards.len() != len || self.dones.len() != len
        {
            return malformed(format!(
                "{} observations, {} actions, {} rewards, {} dones",
                self.observations.len(),
                len,
                self.rewards.len(),
                self.dones.len()
            ));
        }
        if let Some(k) = self.dones[..len - 1].iter().position(|&d| d) {
            return malformed(format!("done at step {} before the last step {}", k, len - 1));
        }
        if !self.dones[len - 1] {
            return malformed("the last step is not done".to_string());
        }
        for obs in self.observations.iter() {
            shapes.check(obs)?;
        }
        if let Some(a) = self.actions.iter().find(|a| a.len() != action_size) {
            return Err(RlServerError::ShapeMismatch(format!(
                "action has {} elements, expected {}",
                a.len(),
                action_size
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(dones: &[bool]) -> Episode {
        let mut e = Episode::new(vec![vec![0.]]);
        for (k, &d) in dones.iter().enumerate() {
            e.push(vec![vec![k as f32]], vec![0.], 1., d);
        }
        e
    }

    #[test]
    fn test_check() {
        let shapes = ObsShapes::vector(1);
        assert!(episode(&[false, false, true]).check(&shapes, 1).is_ok());
        assert!(episode(&[]).check(&shapes, 1).is_err());
        assert!(episode(&[false, true, true]).check(&shapes, 1).is_err());
        assert!(episode(&[false, false]).check(&shapes, 1).is_err());
        assert!(episode(&[true]).check(&shapes, 2).is_err());

        let mut e = episode(&[true]);
        e.rewards.push(0.);
        assert!(e.check(&shapes, 1).is_err());
    }

    #[test]
    fn test_total_reward() {
        assert_eq!(episode(&[false, false, true]).total_reward(), 3.);
    }
}
