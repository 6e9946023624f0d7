//! Counting mock algorithm and scripted environment.
#![allow(dead_code)]
use anyhow::Result;
use rl_server_core::{
    config::ServerConfig,
    record::Record,
    replay_buffer::{Batch, Episode, ObsBatch},
    ActMode, Algorithm, Env, ObsShapes, Observation, Step,
};
use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Calls of the methods of [`MockAlgorithm`], shared between clones.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub acts: Arc<AtomicUsize>,
    pub trains: Arc<AtomicUsize>,
    pub weighted_trains: Arc<AtomicUsize>,
    pub td_errors: Arc<AtomicUsize>,
    pub critic_updates: Arc<AtomicUsize>,
    pub actor_updates: Arc<AtomicUsize>,
    pub saves: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
}

fn get(c: &Arc<AtomicUsize>) -> usize {
    c.load(Ordering::SeqCst)
}

impl Counters {
    pub fn acts(&self) -> usize {
        get(&self.acts)
    }

    pub fn trains(&self) -> usize {
        get(&self.trains)
    }

    pub fn weighted_trains(&self) -> usize {
        get(&self.weighted_trains)
    }

    pub fn td_errors(&self) -> usize {
        get(&self.td_errors)
    }

    pub fn critic_updates(&self) -> usize {
        get(&self.critic_updates)
    }

    pub fn actor_updates(&self) -> usize {
        get(&self.actor_updates)
    }

    pub fn saves(&self) -> usize {
        get(&self.saves)
    }

    pub fn loads(&self) -> usize {
        get(&self.loads)
    }
}

/// An algorithm whose weights are the number of training steps.
#[derive(Debug)]
pub struct MockAlgorithm {
    pub counters: Counters,
    pub action_size: usize,
    weights: usize,
}

impl MockAlgorithm {
    pub fn new(action_size: usize) -> Self {
        Self {
            counters: Counters::default(),
            action_size,
            weights: 0,
        }
    }

    pub fn with_counters(action_size: usize, counters: Counters) -> Self {
        Self {
            counters,
            action_size,
            weights: 0,
        }
    }
}

impl Algorithm for MockAlgorithm {
    type Weights = usize;

    fn act_batch(&self, states: &[ObsBatch], _mode: ActMode) -> Result<Vec<Vec<f32>>> {
        self.counters.acts.fetch_add(1, Ordering::SeqCst);
        Ok(vec![vec![0.5; self.action_size]; states[0].len()])
    }

    fn train(&mut self, batch: &Batch) -> Result<f32> {
        self.counters.trains.fetch_add(1, Ordering::SeqCst);
        if batch.weight.is_some() {
            self.counters.weighted_trains.fetch_add(1, Ordering::SeqCst);
        }
        self.weights += 1;
        Ok(0.1)
    }

    fn get_td_errors(&self, batch: &Batch) -> Result<Vec<f64>> {
        self.counters.td_errors.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.1; batch.len()])
    }

    fn target_critic_update(&mut self) {
        self.counters.critic_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn target_actor_update(&mut self) {
        self.counters.actor_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn get_weights(&self) -> usize {
        self.weights
    }

    fn set_weights(&mut self, weights: &usize) -> Result<()> {
        self.weights = *weights;
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.counters.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ScriptedEnvConfig {
    pub episode_len: usize,
}

/// Observations `[t, t]`, reward 1 per step, done after `episode_len` steps.
pub struct ScriptedEnv {
    config: ScriptedEnvConfig,
    t: usize,
}

impl Env for ScriptedEnv {
    type Config = ScriptedEnvConfig;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            t: 0,
        })
    }

    fn reset(&mut self) -> Result<Observation> {
        self.t = 0;
        Ok(vec![vec![0.0, 0.0]])
    }

    fn step(&mut self, act: &[f32]) -> Result<Step> {
        assert_eq!(act.len(), 1);
        assert!((-1.0..=1.0).contains(&act[0]));
        self.t += 1;
        let t = self.t as f32;
        Ok(Step {
            obs: vec![vec![t, t]],
            reward: 1.0,
            is_done: self.t >= self.config.episode_len,
            info: Record::empty(),
        })
    }

    fn observation_shapes(&self) -> ObsShapes {
        ObsShapes::vector(2)
    }

    fn action_size(&self) -> usize {
        1
    }
}

/// An episode of `len` steps with observations of size 2 and actions of size 1.
pub fn episode(len: usize) -> Episode {
    let mut e = Episode::new(vec![vec![0.0, 0.0]]);
    for t in 1..=len {
        let x = t as f32;
        e.push(vec![vec![x, x]], vec![0.0], 1.0, t == len);
    }
    e
}

/// A small synchronous configuration with `history_length = 1`, `n_step = 1`.
pub fn server_config(save_path: &Path) -> ServerConfig {
    ServerConfig::default()
        .batch_size(4)
        .experience_replay_buffer_size(1000)
        .history_length(1)
        .n_step(1)
        .train_every_nth(1.0)
        .start_learning_after(10)
        .target_critic_update_period(1000)
        .target_actor_update_period(1000)
        .show_stats_period(1000)
        .save_model_period(1000)
        .save_path(save_path)
}

/// A state `[1, 1, 2]` for acting.
pub fn state() -> Vec<ObsBatch> {
    vec![ObsBatch {
        shape: vec![1, 1, 2],
        data: vec![0.0, 0.0],
    }]
}
