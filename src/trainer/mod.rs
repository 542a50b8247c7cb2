//! The training loop.
//!
//! One logical thread drives a phase machine: collect a full rollout from
//! the lockstep environments, run one trust-region policy update plus a
//! minibatched value refit, emit metrics and checkpoints, clear the buffer,
//! repeat until the environment-step budget is spent.
//!
//! The update cycle is atomic with respect to collection: no transition is
//! recorded while parameters change, so every rollout is exactly on-policy
//! for the parameters that produced it.

pub mod config;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::algorithms::gae::{compute_gae_vectorized, normalize_advantages};
use crate::algorithms::trust_region::{trust_region_step, StepOutcome, TrustRegionConfig};
use crate::buffers::rollout_buffer::{RolloutBuffer, RolloutBufferConfig};
use crate::checkpoint::{Checkpointer, CheckpointerConfig};
use crate::core::running_stats::{PreprocessorState, RunningMeanStd, RunningScalarStats};
use crate::core::transition::Transition;
use crate::environment::{ResetMask, VectorizedEnv};
use crate::error::{EnvError, TrainError};
use crate::metrics::logger::{MetricsLogger, TrainingSnapshot};
use crate::nn::policy::{StochasticPolicy, StochasticPolicyConfig};
use crate::nn::value::{ValueFunction, ValueFunctionConfig};
use crate::scheduling::kl_adaptive::KlAdaptiveLr;
use config::TrpoConfig;

/// Number of recent episode returns averaged for the reward metric.
const REWARD_WINDOW: usize = 100;

/// Phase of the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    /// Filling the rollout buffer.
    Collecting,
    /// Buffer full, update not yet started.
    ReadyToUpdate,
    /// Inside an update cycle.
    Updating,
    /// Step budget spent; the loop has exited.
    Done,
}

/// Final statistics of a completed run.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// Update cycles executed.
    pub iterations: usize,
    /// Total environment steps collected.
    pub env_steps: usize,
    /// Episodes completed across all environments.
    pub episodes: usize,
    /// Mean reward over the recent episode window.
    pub mean_reward: f32,
}

/// TRPO trainer over a vectorized environment.
pub struct Trainer<B: AutodiffBackend> {
    config: TrpoConfig,
    device: B::Device,
    policy: StochasticPolicy<B>,
    value: ValueFunction<B>,
    buffer: RolloutBuffer,
    obs_stats: RunningMeanStd,
    value_stats: RunningScalarStats,
    scheduler: KlAdaptiveLr,
    rng: StdRng,
    checkpointer: Option<Checkpointer>,
    phase: TrainerPhase,
    env_steps: usize,
    last_log_step: usize,
    iteration: usize,
    episodes: usize,
    episode_returns: Vec<f32>,
    recent_rewards: Vec<f32>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Build a trainer from a validated config.
    ///
    /// Seeds the backend and the trainer RNG from `config.seed` so two runs
    /// with the same config and environment are identical.
    pub fn new(config: TrpoConfig, device: B::Device) -> Result<Self, TrainError> {
        config.validate()?;

        B::seed(&device, config.seed);

        let policy = StochasticPolicyConfig::new(
            config.observation_dim,
            config.action_dim,
            config.hidden_sizes.clone(),
        )
        .init(&device);
        let value =
            ValueFunctionConfig::new(config.observation_dim, config.hidden_sizes.clone())
                .init(&device);

        let buffer = RolloutBuffer::new(RolloutBufferConfig::new(
            config.rollout_length,
            config.num_environments,
            config.observation_dim,
            config.action_dim,
        ));

        let checkpointer = match &config.checkpoint_dir {
            Some(dir) => Some(Checkpointer::new(
                CheckpointerConfig::new(dir.clone())
                    .with_save_interval(config.checkpoint_interval),
            )?),
            None => None,
        };

        let scheduler = KlAdaptiveLr::new(config.value_learning_rate, config.kl_threshold)
            .with_band_factor(config.kl_band_factor)
            .with_rate_factor(config.kl_rate_factor);

        Ok(Self {
            obs_stats: RunningMeanStd::new(config.observation_dim),
            value_stats: RunningScalarStats::new(),
            scheduler,
            rng: StdRng::seed_from_u64(config.seed),
            checkpointer,
            phase: TrainerPhase::Collecting,
            env_steps: 0,
            last_log_step: 0,
            iteration: 0,
            episodes: 0,
            episode_returns: vec![0.0; config.num_environments],
            recent_rewards: Vec::new(),
            policy,
            value,
            buffer,
            device,
            config,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    /// Total environment steps collected.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// The configuration this trainer runs with.
    pub fn config(&self) -> &TrpoConfig {
        &self.config
    }

    /// The current policy.
    pub fn policy(&self) -> &StochasticPolicy<B> {
        &self.policy
    }

    /// The current value function.
    pub fn value_function(&self) -> &ValueFunction<B> {
        &self.value
    }

    /// Mean reward over the recent episode window.
    pub fn mean_reward(&self) -> f32 {
        if self.recent_rewards.is_empty() {
            0.0
        } else {
            self.recent_rewards.iter().sum::<f32>() / self.recent_rewards.len() as f32
        }
    }

    /// Run the full training loop to the step budget.
    pub fn run<E: VectorizedEnv, L: MetricsLogger>(
        &mut self,
        env: &mut E,
        logger: &mut L,
    ) -> Result<TrainingSummary, TrainError> {
        if env.n_envs() != self.config.num_environments {
            return Err(EnvError::ShapeMismatch {
                expected: self.config.num_environments,
                actual: env.n_envs(),
            }
            .into());
        }
        if env.obs_size() != self.config.observation_dim {
            return Err(EnvError::ShapeMismatch {
                expected: self.config.observation_dim,
                actual: env.obs_size(),
            }
            .into());
        }
        if env.action_size() != self.config.action_dim {
            return Err(EnvError::ShapeMismatch {
                expected: self.config.action_dim,
                actual: env.action_size(),
            }
            .into());
        }

        env.reset_all(self.config.seed)?;

        let mut optimizer = AdamConfig::new()
            .with_epsilon(1e-5)
            .with_grad_clipping(Some(GradientClippingConfig::Norm(
                self.config.grad_norm_clip,
            )))
            .init();

        let trust_region = TrustRegionConfig::new(self.config.max_kl)
            .with_cg_iterations(self.config.cg_iterations)
            .with_cg_damping(self.config.cg_damping)
            .with_backtrack_ratio(self.config.line_search_backtrack_ratio)
            .with_max_backtracks(self.config.line_search_max_backtracks);

        info!(
            "starting run: {} envs x {} steps/cycle, budget {} env steps",
            self.config.num_environments, self.config.rollout_length, self.config.total_timesteps
        );

        while self.phase != TrainerPhase::Done {
            self.phase = TrainerPhase::Collecting;
            self.collect_rollout(env)?;

            self.phase = TrainerPhase::ReadyToUpdate;
            debug_assert!(self.buffer.is_full());

            self.phase = TrainerPhase::Updating;
            let snapshot = self.update_cycle(&trust_region, &mut optimizer);

            // Steps advance by num_environments per tick; crossing
            // semantics, same as the checkpoint interval.
            if self.env_steps >= self.last_log_step + self.config.log_interval {
                logger.log(&snapshot);
                self.last_log_step = self.env_steps;
            }

            if let Some(checkpointer) = &mut self.checkpointer {
                if checkpointer.should_save(self.env_steps) {
                    let stats = PreprocessorState {
                        observations: self.obs_stats.clone(),
                        returns: self.value_stats.clone(),
                    };
                    let metric = snapshot.mean_reward;
                    checkpointer.save_pair(
                        &self.policy,
                        &self.value,
                        &stats,
                        self.env_steps,
                        Some(metric),
                    )?;
                }
            }

            self.buffer.clear();

            if self.env_steps >= self.config.total_timesteps {
                self.phase = TrainerPhase::Done;
            }
        }

        logger.flush();
        info!(
            "run finished: {} cycles, {} env steps, {} episodes",
            self.iteration, self.env_steps, self.episodes
        );

        Ok(TrainingSummary {
            iterations: self.iteration,
            env_steps: self.env_steps,
            episodes: self.episodes,
            mean_reward: self.mean_reward(),
        })
    }

    /// Fill the rollout buffer with one cycle of lockstep experience.
    fn collect_rollout<E: VectorizedEnv>(&mut self, env: &mut E) -> Result<(), TrainError> {
        let n_envs = self.config.num_environments;
        let obs_dim = self.config.observation_dim;
        let action_dim = self.config.action_dim;
        let clip = (-self.config.obs_clip, self.config.obs_clip);

        // Inference copies on the inner backend; no graph is built during
        // collection.
        let policy = self.policy.valid();
        let value = self.value.valid();

        for t in 0..self.config.rollout_length {
            let raw_obs = env.get_observations();
            if raw_obs.len() != n_envs * obs_dim {
                return Err(EnvError::ShapeMismatch {
                    expected: n_envs * obs_dim,
                    actual: raw_obs.len(),
                }
                .into());
            }

            self.obs_stats.update_batch(&raw_obs);
            let norm_obs = self.obs_stats.normalize_batch_and_clip(&raw_obs, clip);

            let obs_tensor: Tensor<B::InnerBackend, 2> =
                Tensor::<B::InnerBackend, 1>::from_floats(norm_obs.as_slice(), &self.device)
                    .reshape([n_envs, obs_dim]);

            let (actions_tensor, log_probs_tensor) =
                policy.sample_actions(obs_tensor.clone(), &mut self.rng);
            let values_norm = value.forward(obs_tensor);

            let actions_data = actions_tensor.into_data();
            let actions = actions_data.as_slice::<f32>().unwrap();
            let log_probs_data = log_probs_tensor.into_data();
            let log_probs = log_probs_data.as_slice::<f32>().unwrap();
            let values_data = values_norm.into_data();
            let values = values_data.as_slice::<f32>().unwrap();

            let result = env.step(actions)?;
            if result.observations.len() != n_envs * obs_dim {
                return Err(EnvError::ShapeMismatch {
                    expected: n_envs * obs_dim,
                    actual: result.observations.len(),
                }
                .into());
            }

            // Value of the post-step observation, before any reset. This is
            // what a truncated episode bootstraps from.
            let norm_next = self
                .obs_stats
                .normalize_batch_and_clip(&result.observations, clip);
            let next_obs_tensor: Tensor<B::InnerBackend, 2> =
                Tensor::<B::InnerBackend, 1>::from_floats(norm_next.as_slice(), &self.device)
                    .reshape([n_envs, obs_dim]);
            let next_values_norm = value.forward(next_obs_tensor);
            let next_values_data = next_values_norm.into_data();
            let next_values = next_values_data.as_slice::<f32>().unwrap();

            for i in 0..n_envs {
                let transition = Transition::new(
                    norm_obs[i * obs_dim..(i + 1) * obs_dim].to_vec(),
                    actions[i * action_dim..(i + 1) * action_dim].to_vec(),
                    log_probs[i],
                    result.rewards[i],
                    self.value_stats.denormalize(values[i]),
                    self.value_stats.denormalize(next_values[i]),
                    result.terminals[i],
                    result.truncations[i],
                );
                self.buffer.record(&transition, i, t)?;

                self.episode_returns[i] += result.rewards[i];
                if result.terminals[i] || result.truncations[i] {
                    self.episodes += 1;
                    if self.recent_rewards.len() == REWARD_WINDOW {
                        self.recent_rewards.remove(0);
                    }
                    self.recent_rewards.push(self.episode_returns[i]);
                    self.episode_returns[i] = 0.0;
                }
            }

            let mask = ResetMask::from_step_result(&result);
            if mask.any() {
                let reset_seed = self.rng.gen::<u64>();
                env.reset_envs(&mask, reset_seed)?;
            }

            self.env_steps += n_envs;
        }

        Ok(())
    }

    /// One atomic update cycle: policy step, value refit, schedule update.
    fn update_cycle(
        &mut self,
        trust_region: &TrustRegionConfig,
        optimizer: &mut impl Optimizer<ValueFunction<B>, B>,
    ) -> TrainingSnapshot {
        let batch = self.buffer.sample_all();
        let n = batch.len();
        let obs_dim = self.config.observation_dim;
        let action_dim = self.config.action_dim;

        let (mut advantages, returns) = compute_gae_vectorized(
            batch.rewards(),
            batch.values(),
            batch.next_values(),
            batch.terminals(),
            batch.truncations(),
            self.config.num_environments,
            self.config.discount_factor,
            self.config.gae_lambda,
        );
        normalize_advantages(&mut advantages);

        let obs_tensor: Tensor<B, 2> =
            Tensor::<B, 1>::from_floats(batch.observations(), &self.device).reshape([n, obs_dim]);
        let actions_tensor: Tensor<B, 2> =
            Tensor::<B, 1>::from_floats(batch.actions(), &self.device).reshape([n, action_dim]);
        let old_log_probs: Tensor<B, 1> =
            Tensor::from_floats(batch.log_probs(), &self.device);
        let advantages_tensor: Tensor<B, 1> =
            Tensor::from_floats(advantages.as_slice(), &self.device);

        let (updated_policy, report) = trust_region_step(
            self.policy.clone(),
            obs_tensor.clone(),
            actions_tensor,
            old_log_probs,
            advantages_tensor,
            trust_region,
        );
        self.policy = updated_policy;

        match report.outcome {
            StepOutcome::Accepted => debug!(
                "cycle {}: step accepted, kl {:.5}, gain {:.5}, {} backtracks",
                self.iteration, report.kl, report.surrogate_improvement, report.backtracks
            ),
            StepOutcome::LineSearchExhausted => info!(
                "cycle {}: line search exhausted after {} trials, policy unchanged",
                self.iteration, report.backtracks
            ),
            StepOutcome::SkippedUnstable => info!(
                "cycle {}: update skipped on numerical instability",
                self.iteration
            ),
        }

        // Value targets live in normalized return space.
        self.value_stats.update_batch(&returns);
        let targets = self.value_stats.normalize_batch(&returns);

        let lr = self.scheduler.rate();
        let minibatch_size = n / self.config.mini_batches;
        let mut indices: Vec<usize> = (0..n).collect();
        let mut value_loss = 0.0f32;

        for _ in 0..self.config.learning_epochs {
            indices.shuffle(&mut self.rng);
            for chunk in indices.chunks(minibatch_size) {
                let mut mb_obs = Vec::with_capacity(chunk.len() * obs_dim);
                let mut mb_targets = Vec::with_capacity(chunk.len());
                for &i in chunk {
                    mb_obs.extend_from_slice(&batch.observations()[i * obs_dim..(i + 1) * obs_dim]);
                    mb_targets.push(targets[i]);
                }

                let mb_obs_tensor: Tensor<B, 2> =
                    Tensor::<B, 1>::from_floats(mb_obs.as_slice(), &self.device)
                        .reshape([chunk.len(), obs_dim]);
                let mb_targets_tensor: Tensor<B, 1> =
                    Tensor::from_floats(mb_targets.as_slice(), &self.device);

                let predicted = self.value.forward(mb_obs_tensor);
                let loss = (predicted - mb_targets_tensor)
                    .powf_scalar(2.0)
                    .mean()
                    .mul_scalar(self.config.value_loss_scale);

                value_loss = loss.clone().into_scalar().elem();

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &self.value);
                self.value = optimizer.step(lr, self.value.clone(), grads);
            }
        }

        self.scheduler.update(report.kl);
        self.iteration += 1;

        TrainingSnapshot::new(self.iteration, self.env_steps, self.episodes, self.mean_reward())
            .with_step_metrics(report.kl, report.surrogate_improvement, report.backtracks)
            .with_value_metrics(value_loss, self.scheduler.rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn tiny_config() -> TrpoConfig {
        TrpoConfig::new(3, 1)
            .with_hidden_sizes(vec![8, 8])
            .with_rollout_length(4)
            .with_num_environments(2)
            .with_mini_batches(2)
            .with_learning_epochs(1)
            .with_total_timesteps(16)
    }

    #[test]
    fn test_new_validates_config() {
        let device = Default::default();
        let bad = tiny_config().with_rollout_length(0);
        let result = Trainer::<TestBackend>::new(bad, device);
        assert!(matches!(result, Err(TrainError::Config(_))));
    }

    #[test]
    fn test_new_starts_collecting() {
        let device = Default::default();
        let trainer = Trainer::<TestBackend>::new(tiny_config(), device).unwrap();

        assert_eq!(trainer.phase(), TrainerPhase::Collecting);
        assert_eq!(trainer.env_steps(), 0);
        assert_eq!(trainer.mean_reward(), 0.0);
    }

    #[test]
    fn test_env_dimension_mismatch_is_fatal() {
        use crate::environment::StepResult;

        struct WrongDims;
        impl VectorizedEnv for WrongDims {
            fn n_envs(&self) -> usize {
                3
            }
            fn obs_size(&self) -> usize {
                3
            }
            fn action_size(&self) -> usize {
                1
            }
            fn write_observations(&self, buffer: &mut [f32]) {
                buffer.fill(0.0);
            }
            fn step(&mut self, _actions: &[f32]) -> Result<StepResult, EnvError> {
                Ok(StepResult::new(
                    vec![0.0; 9],
                    vec![0.0; 3],
                    vec![false; 3],
                    vec![false; 3],
                ))
            }
            fn reset_envs(&mut self, _mask: &ResetMask, _seed: u64) -> Result<(), EnvError> {
                Ok(())
            }
            fn reset_all(&mut self, _seed: u64) -> Result<(), EnvError> {
                Ok(())
            }
        }

        let device = Default::default();
        let mut trainer = Trainer::<TestBackend>::new(tiny_config(), device).unwrap();
        let mut logger = crate::metrics::logger::MultiLogger::new();

        let result = trainer.run(&mut WrongDims, &mut logger);
        assert!(matches!(result, Err(TrainError::Environment(_))));
    }

    #[test]
    fn test_action_dim_mismatch_reports_action_sizes() {
        use crate::environment::StepResult;

        struct WrongActionDim;
        impl VectorizedEnv for WrongActionDim {
            fn n_envs(&self) -> usize {
                2
            }
            fn obs_size(&self) -> usize {
                3
            }
            fn action_size(&self) -> usize {
                2
            }
            fn write_observations(&self, buffer: &mut [f32]) {
                buffer.fill(0.0);
            }
            fn step(&mut self, _actions: &[f32]) -> Result<StepResult, EnvError> {
                Ok(StepResult::new(
                    vec![0.0; 6],
                    vec![0.0; 2],
                    vec![false; 2],
                    vec![false; 2],
                ))
            }
            fn reset_envs(&mut self, _mask: &ResetMask, _seed: u64) -> Result<(), EnvError> {
                Ok(())
            }
            fn reset_all(&mut self, _seed: u64) -> Result<(), EnvError> {
                Ok(())
            }
        }

        let device = Default::default();
        // Config wants 1-dim actions; the env serves 2-dim ones.
        let mut trainer = Trainer::<TestBackend>::new(tiny_config(), device).unwrap();
        let mut logger = crate::metrics::logger::MultiLogger::new();

        match trainer.run(&mut WrongActionDim, &mut logger) {
            Err(TrainError::Environment(EnvError::ShapeMismatch { expected, actual })) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected action shape mismatch, got {:?}", other),
        }
    }
}
