use super::TrainerStat;
use crate::{EpisodeMessage, TrainerError};
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, trace, warn};
use rl_server_core::{
    config::ServerConfig,
    record::{NullRecorder, Record, RecordValue::Scalar, Recorder},
    replay_buffer::{build_replay_buffer, BatchSpec, Episode, IwScheduler, ObsBatch},
    ActMode, Algorithm, ExperienceBufferBase, ObsShapes, ReplayBufferBase,
};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread::{self, JoinHandle},
    time::{Duration, SystemTime},
};

/// Mutable state guarded by the training lock.
struct TrainState {
    buffer: Box<dyn ReplayBufferBase + Send>,

    /// Number of optimization steps done.
    step_index: usize,

    iw_scheduler: IwScheduler,
    recorder: Box<dyn Recorder>,

    /// Optimization steps since the last stats.
    opt_steps_: usize,
    timer: SystemTime,
}

/// What a check of the background loop did.
#[derive(Debug, PartialEq)]
enum LoopStep {
    Trained,
    Paced,
    Idle,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Schedules optimization steps of an [`Algorithm`] on a shared replay buffer.
///
/// # Training loop
///
/// The replay buffer, the step counter and the $\beta$ scheduler are guarded
/// by a single lock, the *training lock*. Pushing episodes, sampling and
/// priority updates all happen under it, so at most one optimization step
/// runs at a time.
///
/// An optimization step is allowed when the number of transitions pushed so
/// far, `stored`, satisfies
///
/// * `stored > start_learning_after`, and
/// * `stored > step_index * train_every_nth`,
///
/// which paces training to data collection. In synchronous mode, every call
/// of [`RlTrainer::act`] checks these conditions after acting and performs
/// `ceil(1 / train_every_nth)` steps if `train_every_nth < 1`, one step
/// otherwise. In asynchronous mode, [`RlTrainer::start_training`] spawns a
/// thread checking them in a loop and doing one step per check.
///
/// An optimization step `step_index`:
///
/// 1. Samples a batch, prioritized or uniform according to the buffer.
/// 2. Trains the algorithm. With a prioritized buffer, TD errors of the batch
///    are fed back as priorities and $\beta$ is advanced.
/// 3. Updates the target critic if `step_index % target_critic_update_period == 0`
///    and the target actor if `step_index % target_actor_update_period == 0`.
/// 4. Logs and records stats if `step_index % show_stats_period == 0`.
/// 5. Saves the parameters in `save_path/model-{step_index}` if
///    `step_index % save_model_period == 0`.
///
/// # Locks
///
/// ```mermaid
/// graph LR
///     A[Actors]-->|act|B[algorithm read lock]
///     A-->|store_episode|C[training lock]
///     C-->|train_step|D[algorithm write lock]
/// ```
///
/// Acting only takes a read lock on the algorithm and releases it before
/// checking the training conditions. The training lock is always taken
/// before the algorithm lock.
pub struct RlTrainer<A: Algorithm> {
    config: ServerConfig,
    shapes: ObsShapes,
    action_size: usize,
    state: Mutex<TrainState>,
    algo: RwLock<A>,
    started: SystemTime,

    /// If `true`, background threads stop.
    stop: Arc<Mutex<bool>>,
}

impl<A: Algorithm> RlTrainer<A> {
    /// Builds a trainer with an empty replay buffer.
    pub fn build(config: &ServerConfig, shapes: ObsShapes, action_size: usize, algo: A) -> Result<Self> {
        config.validate()?;
        let buffer = build_replay_buffer(&config.replay_buffer_config(), shapes.clone(), action_size)?;
        let iw_scheduler = IwScheduler::new(config.initial_beta, config.beta_increment);
        Ok(Self {
            config: config.clone(),
            shapes,
            action_size,
            state: Mutex::new(TrainState {
                buffer,
                step_index: 0,
                iw_scheduler,
                recorder: Box::new(NullRecorder::new()),
                opt_steps_: 0,
                timer: SystemTime::now(),
            }),
            algo: RwLock::new(algo),
            started: SystemTime::now(),
            stop: Arc::new(Mutex::new(false)),
        })
    }

    /// Sets the recorder of stats.
    pub fn with_recorder(mut self, recorder: impl Recorder + 'static) -> Self {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.recorder = Box::new(recorder);
        self
    }

    /// Configuration of the trainer.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shapes of the observation modalities.
    pub fn shapes(&self) -> &ObsShapes {
        &self.shapes
    }

    /// Dimension of actions.
    pub fn action_size(&self) -> usize {
        self.action_size
    }

    fn lock_state(&self) -> Result<MutexGuard<TrainState>> {
        self.state
            .lock()
            .map_err(|_| TrainerError::LockPoisoned("training state".into()).into())
    }

    fn read_algo(&self) -> Result<RwLockReadGuard<A>> {
        self.algo
            .read()
            .map_err(|_| TrainerError::LockPoisoned("algorithm".into()).into())
    }

    fn write_algo(&self) -> Result<RwLockWriteGuard<A>> {
        self.algo
            .write()
            .map_err(|_| TrainerError::LockPoisoned("algorithm".into()).into())
    }

    /// Pushes a complete episode to the replay buffer.
    ///
    /// Fails with [`TrainerError::Stopped`] after [`RlTrainer::stop`].
    pub fn store_episode(&self, episode: Episode) -> Result<()> {
        if self.is_stopped() {
            return Err(TrainerError::Stopped.into());
        }
        let mut state = self.lock_state()?;
        state.buffer.push(episode)
    }

    /// Chooses actions with the act mode named by `mode`.
    ///
    /// An unknown mode is an error. In synchronous mode, the training
    /// conditions are checked after acting.
    pub fn act_batch(&self, states: &[ObsBatch], mode: &str) -> Result<Vec<Vec<f32>>> {
        let mode: ActMode = mode.parse()?;
        self.act(states, mode)
    }

    /// Chooses actions for a batch of history-stacked states.
    ///
    /// In synchronous mode, the training conditions are checked after acting.
    pub fn act(&self, states: &[ObsBatch], mode: ActMode) -> Result<Vec<Vec<f32>>> {
        let actions = {
            let algo = self.read_algo()?;
            algo.act_batch(states, mode)?
        };
        if self.config.use_synchronous_update {
            self.train_loop_step()?;
        }
        Ok(actions)
    }

    /// Performs optimization steps if the training conditions hold, and
    /// returns the number of steps performed.
    pub fn train_loop_step(&self) -> Result<usize> {
        let mut state = self.lock_state()?;
        let stored = state.buffer.get_stored_in_buffer();
        if stored > self.config.start_learning_after {
            if stored as f64 > state.step_index as f64 * self.config.train_every_nth {
                let n = self.config.steps_per_trigger();
                for _ in 0..n {
                    self.train_step(&mut state)?;
                }
                return Ok(n);
            }
        } else if stored < self.config.start_learning_after {
            info!("--- buffer size {}", stored);
        }
        Ok(0)
    }

    /// A check of the background loop.
    fn async_loop_step(&self) -> Result<LoopStep> {
        let mut state = self.lock_state()?;
        let stored = state.buffer.get_stored_in_buffer();
        if stored > self.config.start_learning_after {
            if stored as f64 > state.step_index as f64 * self.config.train_every_nth {
                self.train_step(&mut state)?;
                Ok(LoopStep::Trained)
            } else {
                Ok(LoopStep::Paced)
            }
        } else {
            if state.step_index % 10 == 0 {
                info!("--- buffer size {}", stored);
            }
            Ok(LoopStep::Idle)
        }
    }

    fn train_step(&self, state: &mut TrainState) -> Result<()> {
        let stored = state.buffer.get_stored_in_buffer();
        let prioritized = state.buffer.is_prioritized();
        let spec = BatchSpec::new(
            self.config.batch_size,
            self.config.history_length,
            self.config.n_step,
            self.config.gamma,
        )
        .beta(state.iw_scheduler.beta());
        let batch = state.buffer.batch(&spec)?;

        let mut algo = self.write_algo()?;
        let loss = algo.train(&batch)?;
        if prioritized {
            let td_errs = algo.get_td_errors(&batch)?;
            state.buffer.update_td_errors(&batch.ix_sample, &td_errs);
            state.iw_scheduler.add_n_opts();
        }

        let step = state.step_index;
        if step % self.config.target_critic_update_period == 0 {
            trace!("Update target critic at step {}", step);
            algo.target_critic_update();
        }
        if step % self.config.target_actor_update_period == 0 {
            trace!("Update target actor at step {}", step);
            algo.target_actor_update();
        }
        state.step_index += 1;
        state.opt_steps_ += 1;

        if step % self.config.show_stats_period == 0 {
            let opt_steps = state.opt_steps_ as f64;
            let ops = match state.timer.elapsed() {
                Ok(d) if d.as_secs_f64() > 0. => opt_steps / d.as_secs_f64(),
                _ => 0.,
            };
            info!(
                "trains: {} loss: {} stored: {} opt_steps/sec: {:.1}",
                step, loss, stored, ops
            );
            let mut record = Record::from_slice(&[
                ("loss", Scalar(loss as f64)),
                ("opt_steps", Scalar(step as f64)),
                ("stored", Scalar(stored as f64)),
                ("opt_steps_per_sec", Scalar(ops)),
            ]);
            if prioritized {
                record.insert("beta", Scalar(spec.beta));
            }
            state.opt_steps_ = 0;
            state.timer = SystemTime::now();
            state.recorder.write(Record::now().merge(record));
        }

        if step % self.config.save_model_period == 0 {
            let path = self.config.save_path.join(format!("model-{}", step));
            match algo.save_params(&path) {
                Ok(()) => info!("Saved the model in {:?}", &path),
                Err(e) => warn!("Failed to save model in {:?}: {}", &path, e),
            }
        }
        Ok(())
    }

    /// The current weights, tagged with the number of optimization steps.
    pub fn get_weights(&self) -> Result<(usize, A::Weights)> {
        let state = self.lock_state()?;
        let algo = self.read_algo()?;
        Ok((state.step_index, algo.get_weights()))
    }

    /// Number of optimization steps done.
    pub fn step_index(&self) -> Result<usize> {
        Ok(self.lock_state()?.step_index)
    }

    /// Number of transitions pushed to the replay buffer.
    pub fn get_stored_in_buffer(&self) -> Result<usize> {
        Ok(self.lock_state()?.buffer.get_stored_in_buffer())
    }

    /// Current exponent of importance-sampling weights.
    pub fn beta(&self) -> Result<f64> {
        Ok(self.lock_state()?.iw_scheduler.beta())
    }

    /// Runs `f` with a shared reference to the algorithm.
    pub fn with_algo<T>(&self, f: impl FnOnce(&A) -> T) -> Result<T> {
        let algo = self.read_algo()?;
        Ok(f(&algo))
    }

    /// Stats of the trainer.
    pub fn stat(&self) -> Result<TrainerStat> {
        let state = self.lock_state()?;
        Ok(TrainerStat {
            opt_steps: state.step_index,
            stored: state.buffer.get_stored_in_buffer(),
            duration: self.started.elapsed().unwrap_or_default(),
        })
    }

    /// The flag stopping background threads.
    pub fn stop_flag(&self) -> Arc<Mutex<bool>> {
        self.stop.clone()
    }

    /// Stops background threads.
    pub fn stop(&self) {
        if let Ok(mut stop) = self.stop.lock() {
            *stop = true;
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop.lock().map(|stop| *stop).unwrap_or(true)
    }
}

impl<A: Algorithm + 'static> RlTrainer<A> {
    /// Spawns the background training loop in asynchronous mode.
    ///
    /// Returns `None` in synchronous mode, where training is driven by
    /// [`RlTrainer::act`]. The loop runs until [`RlTrainer::stop`] is called
    /// or a step fails.
    pub fn start_training(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.config.use_synchronous_update {
            return None;
        }
        let trainer = self.clone();
        let idle = Duration::from_millis(self.config.async_idle_sleep_ms);
        let paced = Duration::from_millis(1);

        Some(thread::spawn(move || loop {
            if trainer.is_stopped() {
                info!("Stopped the training loop");
                break;
            }
            match trainer.async_loop_step() {
                Ok(LoopStep::Trained) => {}
                Ok(LoopStep::Paced) => thread::sleep(paced),
                Ok(LoopStep::Idle) => thread::sleep(idle),
                Err(e) => {
                    warn!("Training loop terminated: {}", e);
                    break;
                }
            }
        }))
    }

    /// Spawns a thread pushing the episodes received from actors to the
    /// replay buffer, until [`RlTrainer::stop`] is called or every sender
    /// is dropped.
    pub fn spawn_episode_receiver(self: &Arc<Self>, receiver: Receiver<EpisodeMessage>) -> JoinHandle<()> {
        let trainer = self.clone();
        thread::spawn(move || loop {
            if trainer.is_stopped() {
                break;
            }
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(msg) => {
                    if let Err(e) = trainer.store_episode(msg.episode) {
                        warn!("Dropped an episode of agent {}: {}", msg.agent_id, e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
    }
}
