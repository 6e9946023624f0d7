mod common;
use common::*;
use crossbeam_channel::unbounded;
use rl_server_core::{
    error::RlServerError,
    record::{BufferedRecorder, RecordValue},
    ExperienceBufferBase, ObsShapes,
};
use rl_server_trainer::{EpisodeSender, RlTrainer, TrainerError};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tempdir::TempDir;
use test_log::test;

type Trainer = RlTrainer<MockAlgorithm>;

fn trainer(config: rl_server_core::config::ServerConfig) -> (Trainer, Counters) {
    let algo = MockAlgorithm::new(1);
    let counters = algo.counters.clone();
    let trainer = RlTrainer::build(&config, ObsShapes::vector(2), 1, algo).unwrap();
    (trainer, counters)
}

fn wait_until(timeout: Duration, f: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    f()
}

#[test]
fn test_concurrent_acts_train_once_each() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, counters) = trainer(server_config(dir.path()));
    trainer.store_episode(episode(100)).unwrap();
    let trainer = Arc::new(trainer);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let trainer = trainer.clone();
            thread::spawn(move || trainer.act(&state(), Default::default()).unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), vec![vec![0.5]]);
    }

    assert_eq!(trainer.step_index().unwrap(), 8);
    assert_eq!(counters.trains(), 8);
    assert_eq!(counters.acts(), 8);
}

#[test]
fn test_pacing_and_start_threshold() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, counters) = trainer(server_config(dir.path()).train_every_nth(4.0));

    trainer.store_episode(episode(10)).unwrap();
    for _ in 0..5 {
        trainer.act(&state(), Default::default()).unwrap();
    }
    assert_eq!(counters.trains(), 0);

    // stored = 20 allows steps while 20 > step_index * 4
    trainer.store_episode(episode(10)).unwrap();
    for _ in 0..10 {
        trainer.act(&state(), Default::default()).unwrap();
    }
    assert_eq!(trainer.step_index().unwrap(), 5);
    assert_eq!(trainer.get_stored_in_buffer().unwrap(), 20);
}

#[test]
fn test_fractional_train_every_nth() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, _) = trainer(server_config(dir.path()).train_every_nth(0.25));
    trainer.store_episode(episode(20)).unwrap();

    assert_eq!(trainer.train_loop_step().unwrap(), 4);
    assert_eq!(trainer.step_index().unwrap(), 4);
    trainer.act(&state(), Default::default()).unwrap();
    assert_eq!(trainer.step_index().unwrap(), 8);
}

#[test]
fn test_target_update_cadence() {
    let dir = TempDir::new("trainer").unwrap();
    let config = server_config(dir.path())
        .target_critic_update_period(3)
        .target_actor_update_period(5);
    let (trainer, counters) = trainer(config);
    trainer.store_episode(episode(100)).unwrap();

    for _ in 0..10 {
        assert_eq!(trainer.train_loop_step().unwrap(), 1);
    }
    // steps 0, 3, 6, 9 and 0, 5
    assert_eq!(counters.critic_updates(), 4);
    assert_eq!(counters.actor_updates(), 2);
}

#[test]
fn test_prioritized_feeds_back_td_errors() {
    let dir = TempDir::new("trainer").unwrap();
    let config = server_config(dir.path())
        .use_prioritized_buffer(true)
        .initial_beta(0.4)
        .beta_increment(0.1);
    let (trainer, counters) = trainer(config);
    trainer.store_episode(episode(50)).unwrap();

    for _ in 0..3 {
        trainer.train_loop_step().unwrap();
    }
    assert_eq!(counters.trains(), 3);
    assert_eq!(counters.weighted_trains(), 3);
    assert_eq!(counters.td_errors(), 3);
    assert!((trainer.beta().unwrap() - 0.7).abs() < 1e-9);

    for _ in 0..10 {
        trainer.train_loop_step().unwrap();
    }
    assert_eq!(trainer.beta().unwrap(), 1.0);
}

#[test]
fn test_uniform_skips_td_errors() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, counters) = trainer(server_config(dir.path()).beta_increment(0.1));
    trainer.store_episode(episode(50)).unwrap();

    for _ in 0..3 {
        trainer.train_loop_step().unwrap();
    }
    assert_eq!(counters.trains(), 3);
    assert_eq!(counters.weighted_trains(), 0);
    assert_eq!(counters.td_errors(), 0);
    assert_eq!(trainer.beta().unwrap(), 0.4);
}

#[test]
fn test_unknown_act_mode() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, counters) = trainer(server_config(dir.path()));
    let err = trainer.act_batch(&state(), "greedy").unwrap_err();
    assert_eq!(
        err.downcast_ref::<RlServerError>(),
        Some(&RlServerError::UnknownActMode("greedy".to_string()))
    );
    assert_eq!(counters.acts(), 0);
    assert!(trainer.act_batch(&state(), "sac_deterministic").is_ok());
}

#[test]
fn test_save_model_naming() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, counters) = trainer(server_config(dir.path()).save_model_period(4));
    trainer.store_episode(episode(100)).unwrap();

    for _ in 0..10 {
        trainer.train_loop_step().unwrap();
    }
    assert_eq!(counters.saves(), 3);
    for step in &[0, 4, 8] {
        assert!(dir.path().join(format!("model-{}", step)).is_dir());
    }
    assert!(!dir.path().join("model-5").exists());
}

#[test]
fn test_stats_records() {
    let dir = TempDir::new("trainer").unwrap();
    let recorder = BufferedRecorder::new();
    let (trainer, _) = trainer(server_config(dir.path()).show_stats_period(2));
    let trainer = trainer.with_recorder(recorder.clone());
    trainer.store_episode(episode(100)).unwrap();

    for _ in 0..4 {
        trainer.train_loop_step().unwrap();
    }
    let records = recorder.take();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get_scalar("opt_steps").unwrap(), 0.0);
    assert_eq!(records[1].get_scalar("opt_steps").unwrap(), 2.0);
    assert_eq!(records[1].get_scalar("stored").unwrap(), 100.0);
    assert!((records[1].get_scalar("loss").unwrap() - 0.1).abs() < 1e-6);
    assert!(records[1].get_scalar("beta").is_err());
    for record in records.iter() {
        assert!(record.get_scalar("opt_steps_per_sec").unwrap() >= 0.0);
        assert!(matches!(record.get("datetime"), Some(RecordValue::DateTime(_))));
    }
}

#[test]
fn test_weights_tagged_with_step() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, _) = trainer(server_config(dir.path()));
    assert_eq!(trainer.get_weights().unwrap(), (0, 0));
    trainer.store_episode(episode(100)).unwrap();
    for _ in 0..3 {
        trainer.train_loop_step().unwrap();
    }
    assert_eq!(trainer.get_weights().unwrap(), (3, 3));
}

#[test]
fn test_async_training_loop() {
    let dir = TempDir::new("trainer").unwrap();
    let config = server_config(dir.path())
        .use_synchronous_update(false)
        .async_idle_sleep_ms(10);
    let (trainer, counters) = trainer(config);
    let trainer = Arc::new(trainer);
    let handle = trainer.start_training().unwrap();

    // Acting never trains in asynchronous mode.
    trainer.act(&state(), Default::default()).unwrap();
    trainer.store_episode(episode(50)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || trainer
        .step_index()
        .unwrap()
        == 50));
    trainer.stop();
    handle.join().unwrap();

    assert_eq!(counters.trains(), 50);
    assert!(trainer.store_episode(episode(5)).is_err());
}

#[test]
fn test_sync_mode_has_no_training_thread() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, _) = trainer(server_config(dir.path()));
    assert!(Arc::new(trainer).start_training().is_none());
}

#[test]
fn test_episode_receiver() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, _) = trainer(server_config(dir.path()).start_learning_after(1000));
    let trainer = Arc::new(trainer);
    let (s, r) = unbounded();
    let handle = trainer.spawn_episode_receiver(r);

    let mut sender = EpisodeSender::new(2, s);
    for _ in 0..3 {
        sender.push(episode(5)).unwrap();
    }
    assert!(wait_until(Duration::from_secs(10), || trainer
        .get_stored_in_buffer()
        .unwrap()
        == 15));

    drop(sender);
    handle.join().unwrap();
}

#[test]
fn test_store_after_stop() {
    let dir = TempDir::new("trainer").unwrap();
    let (trainer, _) = trainer(server_config(dir.path()));
    trainer.stop();
    let err = trainer.store_episode(episode(5)).unwrap_err();
    assert_eq!(err.downcast_ref::<TrainerError>(), Some(&TrainerError::Stopped));
}
