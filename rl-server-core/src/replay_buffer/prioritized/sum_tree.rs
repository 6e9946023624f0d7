//! Sum tree for prioritized sampling.
use rand::Rng;
use segment_tree::{
    ops::{MaxIgnoreNaN, MinIgnoreNaN},
    SegmentPoint,
};
use serde::{Deserialize, Serialize};

/// Normalization of importance-sampling weights.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Divides by the largest weight any stored slot could get.
    All,

    /// Divides by the largest weight in the batch.
    Batch,
}

impl Default for WeightNormalizer {
    fn default() -> Self {
        Self::Batch
    }
}

/// Sum tree over `p^alpha` of raw priorities `p`, one leaf per buffer slot.
///
/// Parents are recomputed from their children on every update, so rounding
/// errors do not accumulate. A leaf of priority `0` is never sampled.
#[derive(Debug)]
pub struct SumTree {
    alpha: f64,
    capacity: usize,
    n_positive: usize,
    tree: Vec<f64>,
    min_tree: SegmentPoint<f64, MinIgnoreNaN>,
    max_tree: SegmentPoint<f64, MaxIgnoreNaN>,
}

impl SumTree {
    pub fn new(capacity: usize, alpha: f64) -> Self {
        Self {
            alpha,
            capacity,
            n_positive: 0,
            tree: vec![0f64; 2 * capacity - 1],
            min_tree: SegmentPoint::build(vec![f64::MAX; capacity], MinIgnoreNaN),
            max_tree: SegmentPoint::build(vec![0f64; capacity], MaxIgnoreNaN),
        }
    }

    fn retrieve(&self, ix: usize, s: f64) -> usize {
        let left = 2 * ix + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return ix;
        }

        if s <= self.tree[left] || self.tree[right] == 0f64 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }

    /// Sum of `p^alpha` over all leaves.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// Number of leaves with a positive priority.
    pub fn n_positive(&self) -> usize {
        self.n_positive
    }

    /// Largest raw priority, `1` while every priority is `0`.
    pub fn max_priority(&self) -> f64 {
        let max = self.max_tree.query(0, self.max_tree.len());
        if max > 0. {
            max
        } else {
            1.0
        }
    }

    /// Raw priority at `ix`.
    pub fn priority(&self, ix: usize) -> f64 {
        self.max_tree.query(ix, ix + 1)
    }

    fn leaf(&self, ix: usize) -> f64 {
        self.tree[ix + self.capacity - 1]
    }

    /// Sets the raw priority at `ix`.
    pub fn set(&mut self, ix: usize, p: f64) {
        debug_assert!(ix < self.capacity);
        debug_assert!(p >= 0.);

        let was_positive = self.leaf(ix) > 0.;
        let v = if p > 0. { p.powf(self.alpha) } else { 0. };
        self.min_tree
            .modify(ix, if v > 0. { v } else { f64::MAX });
        self.max_tree.modify(ix, p);
        match (was_positive, v > 0.) {
            (false, true) => self.n_positive += 1,
            (true, false) => self.n_positive -= 1,
            _ => {}
        }

        let mut i = ix + self.capacity - 1;
        self.tree[i] = v;
        while i > 0 {
            i = (i - 1) / 2;
            self.tree[i] = self.tree[2 * i + 1] + self.tree[2 * i + 2];
        }
    }

    /// Get the leaf where the cumulative sum of `p^alpha` reaches `s`.
    pub fn get(&self, s: f64) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        ix + 1 - self.capacity
    }

    /// Samples leaves proportionally to `p^alpha` and returns them with
    /// importance-sampling weights $w_i=\left(N P(i)\right)^{-\beta}$,
    /// where `N` is the number of leaves with a positive priority.
    ///
    /// The tree must hold at least one positive priority.
    pub fn sample(
        &self,
        batch_size: usize,
        beta: f64,
        normalize: WeightNormalizer,
        rng: &mut impl Rng,
    ) -> (Vec<usize>, Vec<f64>) {
        debug_assert!(self.n_positive > 0);
        let p_sum = self.total();
        let ixs = (0..batch_size)
            .map(|_| loop {
                // in (0, p_sum]
                let s = p_sum * (1. - rng.gen::<f64>());
                let ix = self.get(s);
                if self.leaf(ix) > 0. {
                    break ix;
                }
            })
            .collect::<Vec<_>>();

        let n = self.n_positive as f64 / p_sum;
        let ws = ixs
            .iter()
            .map(|&ix| (n * self.leaf(ix)).powf(-beta))
            .collect::<Vec<_>>();

        let w_max_inv = match normalize {
            WeightNormalizer::All => (n * self.min_tree.query(0, self.capacity)).powf(beta),
            WeightNormalizer::Batch => 1. / ws.iter().cloned().fold(f64::NAN, f64::max),
        };

        let ws = ws.iter().map(|w| w * w_max_inv).collect();
        (ixs, ws)
    }
}
