//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum RlServerError {
    /// A configuration value is missing or out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The act mode string does not name a supported mode.
    #[error("Unknown act mode: {0}")]
    UnknownActMode(String),

    /// The algorithm name does not name a supported algorithm.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Prioritized replay was requested for an algorithm without a prioritized variant.
    #[error("{0} has no prioritized version, use ddpg")]
    PrioritizedNotSupported(String),

    /// Sampling was requested before the buffer holds enough transitions.
    #[error("Replay buffer is not ready: {stored} slots stored, more than {required} required")]
    NotReady {
        /// Number of occupied slots.
        stored: usize,
        /// Minimal number of slots, exclusive.
        required: usize,
    },

    /// No slot in the buffer can serve as an anchor of a transition.
    #[error("Replay buffer holds no valid anchor")]
    NoValidAnchor,

    /// The episode violates the episode invariants.
    #[error("Malformed episode: {0}")]
    MalformedEpisode(String),

    /// The episode does not fit in the buffer.
    #[error("Episode of {len} slots does not fit in a buffer of capacity {capacity}")]
    EpisodeTooLong {
        /// Number of slots the episode needs.
        len: usize,
        /// Capacity of the buffer.
        capacity: usize,
    },

    /// An observation or action does not match the shapes of the buffer.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The slot has never been written.
    #[error("Slot {0} has not been written")]
    SlotNotWritten(usize),

    /// A transition was pushed while no episode is open.
    #[error("No open episode, push an initial observation first")]
    EpisodeNotOpen,

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
