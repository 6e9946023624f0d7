use crate::{EpisodeMessage, TrainerError};
use anyhow::Result;
use crossbeam_channel::Sender;
use rl_server_core::{replay_buffer::Episode, ExperienceBufferBase};

/// Actor-side end of the episode channel.
///
/// Pushing an episode sends it whole to the receiver thread of the trainer,
/// see [`RlTrainer::spawn_episode_receiver`](crate::RlTrainer::spawn_episode_receiver).
#[derive(Clone)]
pub struct EpisodeSender {
    agent_id: usize,

    /// Sender of [`EpisodeMessage`].
    sender: Sender<EpisodeMessage>,

    /// Number of episodes sent.
    n_sent: usize,
}

impl EpisodeSender {
    /// Creates a sender for actor `agent_id`.
    pub fn new(agent_id: usize, sender: Sender<EpisodeMessage>) -> Self {
        Self {
            agent_id,
            sender,
            n_sent: 0,
        }
    }

    /// Id of the actor.
    pub fn agent_id(&self) -> usize {
        self.agent_id
    }
}

impl ExperienceBufferBase for EpisodeSender {
    type Item = Episode;

    fn push(&mut self, episode: Episode) -> Result<()> {
        let msg = EpisodeMessage {
            agent_id: self.agent_id,
            episode,
        };
        match self.sender.try_send(msg) {
            Ok(()) => {
                self.n_sent += 1;
                Ok(())
            }
            Err(_e) => Err(TrainerError::SendEpisode(self.agent_id).into()),
        }
    }

    /// Number of episodes sent.
    fn len(&self) -> usize {
        self.n_sent
    }
}
