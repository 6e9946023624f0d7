use rl_server_core::replay_buffer::Episode;

/// Message of a complete episode, sent from an actor to the trainer.
#[derive(Clone, Debug)]
pub struct EpisodeMessage {
    /// Id of the actor.
    pub agent_id: usize,

    /// The episode.
    pub episode: Episode,
}
