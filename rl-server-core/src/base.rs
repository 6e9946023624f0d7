//! Core functionalities.
mod algorithm;
mod env;
mod replay_buffer;
pub use algorithm::{ActMode, Algorithm};
pub use env::{Env, Step};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};

/// An observation of an environment.
///
/// One flat vector per modality, laid out in row-major order according to
/// the corresponding entry of [`ObsShapes`](crate::ObsShapes).
pub type Observation = Vec<Vec<f32>>;
