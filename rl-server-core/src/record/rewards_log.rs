//! Rewards log of an actor.
use anyhow::Result;
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// Append-only text file with one line `agent_id episode_index total_reward`
/// per completed episode.
pub struct RewardsLog {
    path: PathBuf,
    file: File,
}

impl RewardsLog {
    /// Path of the rewards log of an actor in `logdir`.
    pub fn path(logdir: impl AsRef<Path>, agent_id: usize, validation: bool) -> PathBuf {
        let kind = if validation { "test" } else { "train" };
        logdir
            .as_ref()
            .join(format!("rewards-{}-{}.txt", kind, agent_id))
    }

    /// Opens the log for appending, creating the file and its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Opens the log of an actor in `logdir`.
    pub fn open_for(logdir: impl AsRef<Path>, agent_id: usize, validation: bool) -> Result<Self> {
        Self::open(Self::path(logdir, agent_id, validation))
    }

    /// Appends the line of a completed episode.
    pub fn append(&mut self, agent_id: usize, episode_index: usize, total_reward: f64) -> Result<()> {
        writeln!(self.file, "{} {} {}", agent_id, episode_index, total_reward)?;
        self.file.flush()?;
        Ok(())
    }

    /// Path of the file.
    pub fn file_path(&self) -> &Path {
        &self.path
    }
}
