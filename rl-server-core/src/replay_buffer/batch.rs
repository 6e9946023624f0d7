//! Batches of history-stacked transitions.

/// A dense `f32` array in row-major order, used for stacked observations.
#[derive(Clone, Debug, PartialEq)]
pub struct ObsBatch {
    /// Shape of the array.
    pub shape: Vec<usize>,

    /// Elements of the array.
    pub data: Vec<f32>,
}

impl ObsBatch {
    /// Creates an empty array with leading dimension `0` and trailing dimensions `inner`.
    pub fn empty(inner: &[usize]) -> Self {
        let mut shape = vec![0];
        shape.extend_from_slice(inner);
        Self {
            shape,
            data: vec![],
        }
    }

    /// Size of the leading dimension.
    pub fn len(&self) -> usize {
        self.shape.first().cloned().unwrap_or(0)
    }

    /// Returns `true` if the leading dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements in a row of the leading dimension.
    pub fn row_size(&self) -> usize {
        self.shape[1..].iter().product()
    }

    /// Returns the `i`-th row of the leading dimension.
    pub fn row(&self, i: usize) -> &[f32] {
        let n = self.row_size();
        &self.data[i * n..(i + 1) * n]
    }

    /// Appends a row to the leading dimension.
    pub fn push_row(&mut self, row: &[f32]) {
        debug_assert_eq!(row.len(), self.row_size());
        self.data.extend_from_slice(row);
        self.shape[0] += 1;
    }

    /// Stacks arrays of the same shape along a new leading dimension.
    pub fn stack(items: &[ObsBatch]) -> Self {
        let inner = items.first().map(|b| b.shape.clone()).unwrap_or_default();
        let mut out = Self::empty(&inner);
        for item in items.iter() {
            debug_assert_eq!(item.shape, inner);
            out.push_row(&item.data);
        }
        out
    }
}

/// Parameters of a batch request.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchSpec {
    /// Number of samples.
    pub batch_size: usize,

    /// Number of observations stacked into a state.
    pub history_len: usize,

    /// Maximal number of rewards summed into a return.
    pub n_step: usize,

    /// Discount factor.
    pub gamma: f64,

    /// Exponent of importance-sampling weights, used by prioritized buffers only.
    pub beta: f64,
}

impl BatchSpec {
    /// Creates a batch request with `beta = 1`.
    pub fn new(batch_size: usize, history_len: usize, n_step: usize, gamma: f64) -> Self {
        Self {
            batch_size,
            history_len,
            n_step,
            gamma,
            beta: 1.0,
        }
    }

    /// Sets the exponent of importance-sampling weights.
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }
}

/// A batch of n-step transitions.
///
/// For the `i`-th sample with anchor `t` and horizon `k <= n_step`:
/// * `obs` is the history ending at `t`,
/// * `act` is the action taken at `t`,
/// * `reward` is `r_t`,
/// * `n_step_return` is `sum_{j<k} gamma^j r_{t+j}`,
/// * `next_obs` is the history ending at `t+k`,
/// * `is_terminated` tells if `t+k` ends the episode,
/// * `discount` is `gamma^k`, the factor of the bootstrapped value.
#[derive(Clone, Debug)]
pub struct Batch {
    /// History-stacked states, `[batch, history_len, *shape]` per modality.
    pub obs: Vec<ObsBatch>,

    /// Actions, `[batch, action_size]`.
    pub act: ObsBatch,

    /// One-step rewards.
    pub reward: Vec<f64>,

    /// Discounted n-step returns.
    pub n_step_return: Vec<f64>,

    /// History-stacked next states, `[batch, history_len, *shape]` per modality.
    pub next_obs: Vec<ObsBatch>,

    /// Flags denoting if the n-step window reached the end of the episode.
    pub is_terminated: Vec<bool>,

    /// Number of rewards summed into each return.
    pub horizon: Vec<usize>,

    /// `gamma^horizon`.
    pub discount: Vec<f64>,

    /// Buffer slots of the anchors.
    pub ix_sample: Vec<usize>,

    /// Importance-sampling weights, set by prioritized buffers.
    pub weight: Option<Vec<f64>>,
}

impl Batch {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch has no samples.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
