//! Shapes of multi-modal observations.
use crate::error::RlServerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Shapes of the modalities of an observation, e.g. `[[8], [64, 64]]` for
/// a feature vector plus an image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsShapes(pub Vec<Vec<usize>>);

impl ObsShapes {
    /// Shapes of an observation with a single vector modality.
    pub fn vector(size: usize) -> Self {
        Self(vec![vec![size]])
    }

    /// Number of modalities.
    pub fn n_parts(&self) -> usize {
        self.0.len()
    }

    /// Shape of the `i`-th modality.
    pub fn part(&self, i: usize) -> &[usize] {
        &self.0[i]
    }

    /// Number of scalars in each modality.
    pub fn sizes(&self) -> Vec<usize> {
        self.0.iter().map(|s| s.iter().product()).collect()
    }

    /// Shapes of history-stacked states, `[history_len, *shape]` per modality.
    pub fn stacked(&self, history_len: usize) -> Self {
        Self(
            self.0
                .iter()
                .map(|s| std::iter::once(history_len).chain(s.iter().cloned()).collect())
                .collect(),
        )
    }

    /// Checks that `obs` has one flat part per modality with the right length.
    pub fn check(&self, obs: &[Vec<f32>]) -> Result<()> {
        if obs.len() != self.n_parts() {
            return Err(RlServerError::ShapeMismatch(format!(
                "observation has {} parts, expected {}",
                obs.len(),
                self.n_parts()
            ))
            .into());
        }
        for (i, (part, size)) in obs.iter().zip(self.sizes()).enumerate() {
            if part.len() != size {
                return Err(RlServerError::ShapeMismatch(format!(
                    "part {} has {} elements, expected {}",
                    i,
                    part.len(),
                    size
                ))
                .into());
            }
        }
        Ok(())
    }
}
