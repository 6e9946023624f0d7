//! Piecewise-constant schedules of training hyperparameters.
use serde::{Deserialize, Serialize};

/// An entry of a [`Schedule`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ScheduleEntry {
    /// First optimization step where `value` applies.
    pub limit: usize,

    /// Value of the hyperparameter, e.g. a learning rate.
    #[serde(alias = "lr", alias = "batch_size")]
    pub value: f64,
}

/// Piecewise-constant schedule of a hyperparameter over optimization steps.
///
/// ```yaml
/// schedule:
///   - limit: 0
///     lr: 0.001
///   - limit: 500000
///     lr: 0.0005
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct Schedule {
    /// Entries, sorted by `limit` in descending order.
    pub schedule: Vec<ScheduleEntry>,
}

impl Schedule {
    /// Creates a schedule with a single value.
    pub fn constant(value: f64) -> Self {
        Self {
            schedule: vec![ScheduleEntry { limit: 0, value }],
        }
    }

    /// Adds an entry.
    pub fn entry(mut self, limit: usize, value: f64) -> Self {
        self.schedule.push(ScheduleEntry { limit, value });
        self.sort();
        self
    }

    /// Sorts the entries by `limit` in descending order.
    pub fn sort(&mut self) {
        self.schedule.sort_by(|a, b| b.limit.cmp(&a.limit));
    }

    /// Value at optimization step `step`, taken from the entry with the
    /// largest `limit <= step`.
    pub fn value_at(&self, step: usize) -> Option<f64> {
        self.schedule
            .iter()
            .find(|e| e.limit <= step)
            .map(|e| e.value)
    }
}
