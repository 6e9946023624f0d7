//! Training-loop scheduler.
mod base;
mod stat;
pub use base::RlTrainer;
pub use stat::TrainerStat;
