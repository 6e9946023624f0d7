//! Actor-side access to the trainer.
use crate::{EpisodeSender, RlTrainer};
use anyhow::Result;
use log::debug;
use rl_server_core::{
    replay_buffer::{Episode, ObsBatch},
    ActMode, Algorithm, ExperienceBufferBase,
};
use std::sync::Arc;

/// The trainer as seen by an actor.
pub trait RlClient {
    /// Chooses actions for a batch of history-stacked states.
    fn act(&mut self, states: &[ObsBatch], mode: ActMode) -> Result<Vec<Vec<f32>>>;

    /// Ships a complete episode to the replay buffer.
    fn store_episode(&mut self, episode: Episode) -> Result<()>;

    /// Refreshes the policy used for acting, called every `fetch_every` episodes.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Ships an episode directly or through the episode channel.
fn ship<A: Algorithm>(
    trainer: &RlTrainer<A>,
    sender: &mut Option<EpisodeSender>,
    episode: Episode,
) -> Result<()> {
    match sender {
        Some(sender) => sender.push(episode),
        None => trainer.store_episode(episode),
    }
}

/// Acts with the trainer's algorithm, which drives synchronous training.
pub struct LocalClient<A: Algorithm> {
    trainer: Arc<RlTrainer<A>>,
    sender: Option<EpisodeSender>,
}

impl<A: Algorithm> LocalClient<A> {
    /// Creates a client storing episodes directly.
    pub fn new(trainer: Arc<RlTrainer<A>>) -> Self {
        Self {
            trainer,
            sender: None,
        }
    }

    /// Creates a client shipping episodes through a channel.
    pub fn with_sender(trainer: Arc<RlTrainer<A>>, sender: EpisodeSender) -> Self {
        Self {
            trainer,
            sender: Some(sender),
        }
    }
}

impl<A: Algorithm> RlClient for LocalClient<A> {
    fn act(&mut self, states: &[ObsBatch], mode: ActMode) -> Result<Vec<Vec<f32>>> {
        self.trainer.act(states, mode)
    }

    fn store_episode(&mut self, episode: Episode) -> Result<()> {
        ship(&self.trainer, &mut self.sender, episode)
    }
}

/// Acts with a local copy of the algorithm, refreshed from the trainer's
/// published weights.
///
/// Acting never triggers training, and the local weights may lag behind the
/// trainer between refreshes.
pub struct AgentModel<A: Algorithm> {
    trainer: Arc<RlTrainer<A>>,
    sender: Option<EpisodeSender>,
    algo: A,

    /// Optimization step of the local weights.
    step: Option<usize>,
}

impl<A: Algorithm> AgentModel<A> {
    /// Creates a model acting with `algo` until the first fetch.
    pub fn new(trainer: Arc<RlTrainer<A>>, algo: A) -> Self {
        Self {
            trainer,
            sender: None,
            algo,
            step: None,
        }
    }

    /// Ships episodes through a channel.
    pub fn sender(mut self, sender: EpisodeSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Copies the weights published by the trainer.
    pub fn fetch(&mut self) -> Result<usize> {
        let (step, weights) = self.trainer.get_weights()?;
        self.algo.set_weights(&weights)?;
        self.step = Some(step);
        debug!("Fetched the weights of step {}", step);
        Ok(step)
    }

    /// Optimization step of the local weights, `None` before the first fetch.
    pub fn step(&self) -> Option<usize> {
        self.step
    }

    /// The local algorithm.
    pub fn algo(&self) -> &A {
        &self.algo
    }
}

impl<A: Algorithm> RlClient for AgentModel<A> {
    fn act(&mut self, states: &[ObsBatch], mode: ActMode) -> Result<Vec<Vec<f32>>> {
        self.algo.act_batch(states, mode)
    }

    fn store_episode(&mut self, episode: Episode) -> Result<()> {
        ship(&self.trainer, &mut self.sender, episode)
    }

    fn refresh(&mut self) -> Result<()> {
        self.fetch().map(|_| ())
    }
}
