//! End-to-end training loop test on a deterministic synthetic environment.

use trpo_rl::{
    EnvError, MetricsLogger, MultiLogger, ResetMask, StepResult, Trainer, TrainerPhase,
    TrainingSnapshot, TrpoConfig, VectorizedEnv,
};

use burn::backend::{Autodiff, NdArray};

type TestBackend = Autodiff<NdArray<f32>>;

const OBS_DIM: usize = 3;
const ACTION_DIM: usize = 1;
const EPISODE_LIMIT: usize = 16;

/// Point-mass regulation task: the first observation component drifts with
/// the action, reward is its negated distance from zero, episodes truncate
/// after a fixed step limit.
struct PointMassEnv {
    n_envs: usize,
    states: Vec<[f32; OBS_DIM]>,
    steps_in_episode: Vec<usize>,
}

impl PointMassEnv {
    fn new(n_envs: usize) -> Self {
        Self {
            n_envs,
            states: vec![[0.0; OBS_DIM]; n_envs],
            steps_in_episode: vec![0; n_envs],
        }
    }

    fn reset_one(&mut self, i: usize, seed: u64) {
        // Deterministic spread of initial positions from the seed.
        let offset = ((seed.wrapping_add(i as u64) % 7) as f32 - 3.0) * 0.3;
        self.states[i] = [offset, 0.5, -0.5];
        self.steps_in_episode[i] = 0;
    }
}

impl VectorizedEnv for PointMassEnv {
    fn n_envs(&self) -> usize {
        self.n_envs
    }

    fn obs_size(&self) -> usize {
        OBS_DIM
    }

    fn action_size(&self) -> usize {
        ACTION_DIM
    }

    fn write_observations(&self, buffer: &mut [f32]) {
        for (i, state) in self.states.iter().enumerate() {
            buffer[i * OBS_DIM..(i + 1) * OBS_DIM].copy_from_slice(state);
        }
    }

    fn step(&mut self, actions: &[f32]) -> Result<StepResult, EnvError> {
        if actions.len() != self.n_envs * ACTION_DIM {
            return Err(EnvError::ShapeMismatch {
                expected: self.n_envs * ACTION_DIM,
                actual: actions.len(),
            });
        }

        let mut rewards = Vec::with_capacity(self.n_envs);
        let mut truncations = Vec::with_capacity(self.n_envs);

        for i in 0..self.n_envs {
            let action = actions[i].clamp(-1.0, 1.0);
            self.states[i][0] = (self.states[i][0] + 0.1 * action).clamp(-5.0, 5.0);
            self.steps_in_episode[i] += 1;

            rewards.push(-self.states[i][0].abs());
            truncations.push(self.steps_in_episode[i] >= EPISODE_LIMIT);
        }

        Ok(StepResult::new(
            self.get_observations(),
            rewards,
            vec![false; self.n_envs],
            truncations,
        ))
    }

    fn reset_envs(&mut self, mask: &ResetMask, seed: u64) -> Result<(), EnvError> {
        for i in 0..self.n_envs {
            if mask.as_slice()[i] {
                self.reset_one(i, seed);
            }
        }
        Ok(())
    }

    fn reset_all(&mut self, seed: u64) -> Result<(), EnvError> {
        for i in 0..self.n_envs {
            self.reset_one(i, seed);
        }
        Ok(())
    }
}

fn tiny_config() -> TrpoConfig {
    TrpoConfig::new(OBS_DIM, ACTION_DIM)
        .with_hidden_sizes(vec![16, 16])
        .with_rollout_length(8)
        .with_num_environments(2)
        .with_learning_epochs(2)
        .with_mini_batches(2)
        .with_total_timesteps(64)
        .with_seed(7)
}

#[test]
fn test_full_loop_runs_to_budget() {
    let device = Default::default();
    let config = tiny_config().build().unwrap();

    let mut trainer: Trainer<TestBackend> = Trainer::new(config, device).unwrap();
    let mut env = PointMassEnv::new(2);
    let mut logger = MultiLogger::new();

    let summary = trainer.run(&mut env, &mut logger).unwrap();

    assert_eq!(trainer.phase(), TrainerPhase::Done);
    // 2 envs x 8 steps per cycle = 16 env steps per cycle, 4 cycles
    assert_eq!(summary.env_steps, 64);
    assert_eq!(summary.iterations, 4);
    // Each env truncates every 16 steps over 32 steps
    assert_eq!(summary.episodes, 4);
    assert!(summary.mean_reward.is_finite());
}

#[test]
fn test_run_is_reproducible_for_same_seed() {
    let run = || {
        let device = Default::default();
        let config = tiny_config().build().unwrap();
        let mut trainer: Trainer<TestBackend> = Trainer::new(config, device).unwrap();
        let mut env = PointMassEnv::new(2);
        let mut logger = MultiLogger::new();
        trainer.run(&mut env, &mut logger).unwrap().mean_reward
    };

    assert_eq!(run(), run());
}

struct CountingLogger {
    logs: usize,
}

impl MetricsLogger for CountingLogger {
    fn log(&mut self, _snapshot: &TrainingSnapshot) {
        self.logs += 1;
    }

    fn flush(&mut self) {}
}

#[test]
fn test_log_interval_controls_emission_cadence() {
    let count_logs = |interval: usize| {
        let device = Default::default();
        let config = tiny_config().with_log_interval(interval).build().unwrap();
        let mut trainer: Trainer<TestBackend> = Trainer::new(config, device).unwrap();
        let mut env = PointMassEnv::new(2);
        let mut logger = CountingLogger { logs: 0 };
        trainer.run(&mut env, &mut logger).unwrap();
        logger.logs
    };

    // 16 env steps per cycle over 4 cycles: an interval of one cycle's
    // worth of steps emits every cycle, the full budget only once.
    assert_eq!(count_logs(16), 4);
    assert_eq!(count_logs(64), 1);
}

#[test]
fn test_checkpoints_written_during_run() {
    let dir = tempfile::tempdir().unwrap();
    let device = Default::default();
    let config = tiny_config()
        .with_checkpoint_dir(dir.path())
        .with_checkpoint_interval(32)
        .build()
        .unwrap();

    let mut trainer: Trainer<TestBackend> = Trainer::new(config, device).unwrap();
    let mut env = PointMassEnv::new(2);
    let mut logger = MultiLogger::new();
    trainer.run(&mut env, &mut logger).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .collect();
    assert!(names
        .iter()
        .any(|n| n.starts_with("policy_") && n.ends_with(".bin")));
    // Preprocessor state is saved next to every pair
    assert!(names
        .iter()
        .any(|n| n.starts_with("stats_") && n.ends_with(".json")));
}
