use super::{ActorConfig, ActorStat};
use crate::{RlClient, TrainerError};
use anyhow::Result;
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rl_server_core::{
    error::RlServerError, record::RewardsLog, replay_buffer::AgentBuffer, ActMode, Env, ObsShapes,
};
use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};

/// Runs episodes of an [`Env`], choosing actions through an [`RlClient`].
///
/// Each episode is staged in an [`AgentBuffer`] and shipped whole when it
/// ends. Actions get Gaussian exploration noise, except in validation mode,
/// and are clipped to `[-1, 1]`.
pub struct Actor<E: Env, C: RlClient> {
    config: ActorConfig,
    act_mode: ActMode,
    env: E,
    client: C,
    shapes: ObsShapes,
    action_size: usize,
    noise: Normal<f64>,
    rng: StdRng,
    rewards_log: Option<RewardsLog>,

    /// Stops the episode loop if set to `true`.
    stop: Arc<Mutex<bool>>,

    episode_index: usize,
    env_steps: usize,
}

impl<E: Env, C: RlClient> Actor<E, C> {
    /// Builds an actor and its environment.
    ///
    /// Fails if the configuration is invalid, the act mode is unknown or the
    /// rewards log cannot be opened.
    pub fn build(
        config: ActorConfig,
        env_config: &E::Config,
        client: C,
        stop: Arc<Mutex<bool>>,
    ) -> Result<Self> {
        config.validate()?;
        let act_mode: ActMode = config.act_mode.parse()?;
        let env = E::build(env_config, config.seed)?;
        let shapes = env.observation_shapes();
        let action_size = env.action_size();
        let noise = Normal::new(0.0, config.exploration_noise)?;
        let rewards_log = match &config.logdir {
            Some(logdir) => Some(RewardsLog::open_for(
                logdir,
                config.agent_id,
                config.validation,
            )?),
            None => None,
        };
        let rng = StdRng::seed_from_u64(config.seed as u64);

        Ok(Self {
            config,
            act_mode,
            env,
            client,
            shapes,
            action_size,
            noise,
            rng,
            rewards_log,
            stop,
            episode_index: 0,
            env_steps: 0,
        })
    }

    /// The client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Number of completed episodes.
    pub fn episode_index(&self) -> usize {
        self.episode_index
    }

    fn is_stopped(&self) -> bool {
        self.stop.lock().map(|stop| *stop).unwrap_or(true)
    }

    fn explore(&mut self, mut act: Vec<f32>) -> Vec<f32> {
        for a in act.iter_mut() {
            if !self.config.validation {
                *a += self.noise.sample(&mut self.rng) as f32;
            }
            *a = a.clamp(-1.0, 1.0);
        }
        act
    }

    /// Runs an episode, ships it and returns its total reward.
    pub fn run_episode(&mut self) -> Result<f64> {
        let mut buffer = AgentBuffer::new(
            self.config.max_episode_len,
            self.shapes.clone(),
            self.action_size,
        );
        let obs = self.env.reset()?;
        buffer.push_init_observation(&obs)?;

        while !buffer.is_done() {
            let state = buffer.get_current_state(self.config.history_length)?;
            let act = match self.client.act(&state, self.act_mode)?.into_iter().next() {
                Some(act) if act.len() == self.action_size => act,
                Some(act) => {
                    return Err(RlServerError::ShapeMismatch(format!(
                        "action of size {}, expected {}",
                        act.len(),
                        self.action_size
                    ))
                    .into())
                }
                None => {
                    return Err(
                        RlServerError::ShapeMismatch("no action for the state".into()).into(),
                    )
                }
            };
            let act = self.explore(act);
            let step = self.env.step(&act)?;
            let is_done = step.is_done || buffer.len() + 1 >= self.config.max_episode_len;
            buffer.push_transition(&step.obs, &act, step.reward, is_done)?;
            self.env_steps += 1;
        }

        let mut episode = buffer.get_complete_episode()?;
        let (len, total_reward) = (episode.len(), episode.total_reward());
        episode.agent_id = Some(self.config.agent_id);
        episode.episode_index = Some(self.episode_index);
        self.client.store_episode(episode)?;
        if let Some(log) = self.rewards_log.as_mut() {
            log.append(self.config.agent_id, self.episode_index, total_reward)?;
        }
        info!(
            "--- episode ended {} {} {} {}",
            self.config.agent_id, self.episode_index, len, total_reward
        );

        self.episode_index += 1;
        if self.config.fetch_every > 0 && self.episode_index % self.config.fetch_every == 0 {
            self.client.refresh()?;
        }
        Ok(total_reward)
    }

    /// Runs episodes until the stop flag is set or `max_episodes` episodes
    /// are completed.
    pub fn run(&mut self) -> Result<ActorStat> {
        let time = SystemTime::now();
        let (episodes, env_steps) = (self.episode_index, self.env_steps);
        loop {
            if self.is_stopped() {
                info!("Stopped actor {}", self.config.agent_id);
                break;
            }
            if let Some(n) = self.config.max_episodes {
                if self.episode_index - episodes >= n {
                    break;
                }
            }
            match self.run_episode() {
                Ok(_) => {}
                Err(e) if e.downcast_ref::<TrainerError>() == Some(&TrainerError::Stopped) => {
                    info!("Trainer stopped, actor {} exits", self.config.agent_id);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ActorStat {
            env_steps: self.env_steps - env_steps,
            episodes: self.episode_index - episodes,
            duration: time.elapsed().unwrap_or_default(),
        })
    }
}
