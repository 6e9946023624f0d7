use thiserror::Error;

/// Errors of the trainer.
#[derive(Error, Debug, PartialEq)]
pub enum TrainerError {
    /// An episode could not be sent to the trainer.
    #[error("Failed to send an episode of agent {0}")]
    SendEpisode(usize),

    /// The trainer has been stopped.
    #[error("Trainer has been stopped")]
    Stopped,

    /// A thread panicked while holding a lock.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}
