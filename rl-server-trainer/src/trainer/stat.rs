use std::time::Duration;

/// Stats of [`RlTrainer`](crate::RlTrainer).
#[derive(Clone, Debug)]
pub struct TrainerStat {
    /// The number of optimization steps.
    pub opt_steps: usize,

    /// The number of transitions pushed to the replay buffer.
    pub stored: usize,

    /// Time since the trainer was built.
    pub duration: Duration,
}

impl TrainerStat {
    /// The number of optimization steps per second.
    pub fn opt_per_sec(&self) -> f32 {
        self.opt_steps as f32 / self.duration.as_secs_f32()
    }

    /// The number of transitions pushed per second.
    pub fn samples_per_sec(&self) -> f32 {
        self.stored as f32 / self.duration.as_secs_f32()
    }

    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "samples/sec, opt_steps/sec, duration\n".to_string();
        s += format!(
            "{}, {}, {}\n",
            self.samples_per_sec(),
            self.opt_per_sec(),
            self.duration.as_secs_f32()
        )
        .as_str();
        s
    }
}
