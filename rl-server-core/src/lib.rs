#![warn(missing_docs)]
//! Core of rl-server: experience replay for off-policy continuous control.
//!
//! The crate stores transitions shipped by remote actors as whole episodes,
//! and produces training batches with n-step returns, history-stacked states
//! and, optionally, prioritized sampling with importance-sampling correction.
//!
//! The neural networks and environments are collaborators, seen only through
//! the [`Algorithm`] and [`Env`] traits.
pub mod config;
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    ActMode, Algorithm, Env, ExperienceBufferBase, Observation, ReplayBufferBase, Step,
};

mod shape;
pub use shape::ObsShapes;
