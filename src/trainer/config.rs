//! Training configuration.
//!
//! All hyperparameters live in one struct built with `with_*` setters and
//! checked once by [`TrpoConfig::build`]; nothing downstream re-validates,
//! so a config that failed validation never reaches the trainer.

use std::path::PathBuf;

/// Validation failure for a [`TrpoConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count field that must be positive was zero.
    InvalidCount {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: usize,
    },
    /// A real-valued field fell outside its admissible interval.
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f64,
        /// Lower bound of the admissible interval.
        min: f64,
        /// Upper bound of the admissible interval.
        max: f64,
    },
    /// Rollout capacity does not divide evenly into minibatches.
    InvalidMinibatch {
        /// Transitions per rollout cycle.
        transitions: usize,
        /// Requested minibatch count.
        mini_batches: usize,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be positive, got {}", field, value)
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "{} must be within [{}, {}], got {}",
                field, min, max, value
            ),
            ConfigError::InvalidMinibatch {
                transitions,
                mini_batches,
            } => write!(
                f,
                "rollout of {} transitions does not split into {} minibatches",
                transitions, mini_batches
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Full hyperparameter surface of a training run.
#[derive(Debug, Clone)]
pub struct TrpoConfig {
    /// Observation dimension.
    pub observation_dim: usize,
    /// Action dimension.
    pub action_dim: usize,
    /// Hidden layer widths shared by policy and value trunks.
    pub hidden_sizes: Vec<usize>,
    /// Timesteps collected per environment per cycle.
    pub rollout_length: usize,
    /// Number of lockstep parallel environments.
    pub num_environments: usize,
    /// Discount factor γ.
    pub discount_factor: f32,
    /// GAE smoothing parameter λ.
    pub gae_lambda: f32,
    /// KL radius δ of the trust region.
    pub max_kl: f64,
    /// Conjugate gradient iterations.
    pub cg_iterations: usize,
    /// Fisher damping coefficient.
    pub cg_damping: f64,
    /// Line search trials before giving up.
    pub line_search_max_backtracks: usize,
    /// Multiplicative step shrink per line search trial.
    pub line_search_backtrack_ratio: f64,
    /// Value refit passes over the rollout per cycle.
    pub learning_epochs: usize,
    /// Minibatches per value refit epoch.
    pub mini_batches: usize,
    /// Initial value optimizer learning rate.
    pub value_learning_rate: f64,
    /// Multiplier on the value loss.
    pub value_loss_scale: f32,
    /// Gradient norm clip for the value optimizer.
    pub grad_norm_clip: f32,
    /// Total environment steps before the run finishes.
    pub total_timesteps: usize,
    /// Environment steps between checkpoint saves.
    pub checkpoint_interval: usize,
    /// Environment steps between log entries.
    pub log_interval: usize,
    /// Seed for every RNG in the run.
    pub seed: u64,
    /// Symmetric clip applied to normalized observations.
    pub obs_clip: f32,
    /// Target KL for the adaptive value-rate schedule.
    pub kl_threshold: f64,
    /// Tolerance band multiplier of the schedule.
    pub kl_band_factor: f64,
    /// Multiplicative rate adjustment of the schedule.
    pub kl_rate_factor: f64,
    /// Checkpoint directory; `None` disables checkpointing.
    pub checkpoint_dir: Option<PathBuf>,
}

impl TrpoConfig {
    /// Create a config with standard defaults for the given dimensions.
    pub fn new(observation_dim: usize, action_dim: usize) -> Self {
        Self {
            observation_dim,
            action_dim,
            hidden_sizes: vec![512, 256, 128],
            rollout_length: 32,
            num_environments: 1,
            discount_factor: 0.99,
            gae_lambda: 0.95,
            max_kl: 0.01,
            cg_iterations: 10,
            cg_damping: 0.1,
            line_search_max_backtracks: 10,
            line_search_backtrack_ratio: 0.8,
            learning_epochs: 16,
            mini_batches: 8,
            value_learning_rate: 5e-4,
            value_loss_scale: 2.0,
            grad_norm_clip: 1.0,
            total_timesteps: 1_000_000,
            checkpoint_interval: 1000,
            log_interval: 100,
            seed: 42,
            obs_clip: 5.0,
            kl_threshold: 0.008,
            kl_band_factor: 2.0,
            kl_rate_factor: 1.5,
            checkpoint_dir: None,
        }
    }

    /// Set the hidden layer widths.
    pub fn with_hidden_sizes(mut self, hidden_sizes: Vec<usize>) -> Self {
        self.hidden_sizes = hidden_sizes;
        self
    }

    /// Set the rollout length.
    pub fn with_rollout_length(mut self, rollout_length: usize) -> Self {
        self.rollout_length = rollout_length;
        self
    }

    /// Set the number of parallel environments.
    pub fn with_num_environments(mut self, num_environments: usize) -> Self {
        self.num_environments = num_environments;
        self
    }

    /// Set the discount factor.
    pub fn with_discount_factor(mut self, discount_factor: f32) -> Self {
        self.discount_factor = discount_factor;
        self
    }

    /// Set the GAE lambda.
    pub fn with_gae_lambda(mut self, gae_lambda: f32) -> Self {
        self.gae_lambda = gae_lambda;
        self
    }

    /// Set the KL radius.
    pub fn with_max_kl(mut self, max_kl: f64) -> Self {
        self.max_kl = max_kl;
        self
    }

    /// Set the conjugate gradient iteration count.
    pub fn with_cg_iterations(mut self, cg_iterations: usize) -> Self {
        self.cg_iterations = cg_iterations;
        self
    }

    /// Set the Fisher damping coefficient.
    pub fn with_cg_damping(mut self, cg_damping: f64) -> Self {
        self.cg_damping = cg_damping;
        self
    }

    /// Set the line search trial budget.
    pub fn with_line_search_max_backtracks(mut self, max_backtracks: usize) -> Self {
        self.line_search_max_backtracks = max_backtracks;
        self
    }

    /// Set the line search shrink ratio.
    pub fn with_line_search_backtrack_ratio(mut self, ratio: f64) -> Self {
        self.line_search_backtrack_ratio = ratio;
        self
    }

    /// Set the value refit epoch count.
    pub fn with_learning_epochs(mut self, learning_epochs: usize) -> Self {
        self.learning_epochs = learning_epochs;
        self
    }

    /// Set the minibatch count per epoch.
    pub fn with_mini_batches(mut self, mini_batches: usize) -> Self {
        self.mini_batches = mini_batches;
        self
    }

    /// Set the initial value learning rate.
    pub fn with_value_learning_rate(mut self, value_learning_rate: f64) -> Self {
        self.value_learning_rate = value_learning_rate;
        self
    }

    /// Set the value loss scale.
    pub fn with_value_loss_scale(mut self, value_loss_scale: f32) -> Self {
        self.value_loss_scale = value_loss_scale;
        self
    }

    /// Set the gradient norm clip.
    pub fn with_grad_norm_clip(mut self, grad_norm_clip: f32) -> Self {
        self.grad_norm_clip = grad_norm_clip;
        self
    }

    /// Set the total environment step budget.
    pub fn with_total_timesteps(mut self, total_timesteps: usize) -> Self {
        self.total_timesteps = total_timesteps;
        self
    }

    /// Set the checkpoint interval.
    pub fn with_checkpoint_interval(mut self, checkpoint_interval: usize) -> Self {
        self.checkpoint_interval = checkpoint_interval;
        self
    }

    /// Set the log interval.
    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }

    /// Set the run seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the normalized observation clip.
    pub fn with_obs_clip(mut self, obs_clip: f32) -> Self {
        self.obs_clip = obs_clip;
        self
    }

    /// Set the adaptive schedule KL threshold.
    pub fn with_kl_threshold(mut self, kl_threshold: f64) -> Self {
        self.kl_threshold = kl_threshold;
        self
    }

    /// Set the checkpoint directory.
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Transitions per full rollout cycle.
    pub fn rollout_capacity(&self) -> usize {
        self.rollout_length * self.num_environments
    }

    /// Check every field against its admissible range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("observation_dim", self.observation_dim),
            ("action_dim", self.action_dim),
            ("rollout_length", self.rollout_length),
            ("num_environments", self.num_environments),
            ("learning_epochs", self.learning_epochs),
            ("mini_batches", self.mini_batches),
            ("total_timesteps", self.total_timesteps),
            ("line_search_max_backtracks", self.line_search_max_backtracks),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }

        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(ConfigError::OutOfRange {
                field: "discount_factor",
                value: f64::from(self.discount_factor),
                min: 0.0,
                max: 1.0,
            });
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(ConfigError::OutOfRange {
                field: "gae_lambda",
                value: f64::from(self.gae_lambda),
                min: 0.0,
                max: 1.0,
            });
        }
        if !self.max_kl.is_finite() || self.max_kl <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "max_kl",
                value: self.max_kl,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        if !self.cg_damping.is_finite() || self.cg_damping < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "cg_damping",
                value: self.cg_damping,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        if !(self.line_search_backtrack_ratio > 0.0 && self.line_search_backtrack_ratio < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "line_search_backtrack_ratio",
                value: self.line_search_backtrack_ratio,
                min: 0.0,
                max: 1.0,
            });
        }
        if !self.value_learning_rate.is_finite() || self.value_learning_rate <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "value_learning_rate",
                value: self.value_learning_rate,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        if !self.kl_threshold.is_finite() || self.kl_threshold <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "kl_threshold",
                value: self.kl_threshold,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        if self.obs_clip <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "obs_clip",
                value: f64::from(self.obs_clip),
                min: 0.0,
                max: f64::INFINITY,
            });
        }

        if self.rollout_capacity() % self.mini_batches != 0 {
            return Err(ConfigError::InvalidMinibatch {
                transitions: self.rollout_capacity(),
                mini_batches: self.mini_batches,
            });
        }

        Ok(())
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> TrpoConfig {
        TrpoConfig::new(8, 2)
            .with_num_environments(4)
            .with_rollout_length(16)
            .with_mini_batches(8)
    }

    #[test]
    fn test_defaults_validate() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_zero_count_rejected() {
        let err = valid_config().with_rollout_length(0).validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidCount {
                field: "rollout_length",
                value: 0
            }
        );
    }

    #[test]
    fn test_discount_out_of_range_rejected() {
        let err = valid_config().with_discount_factor(1.5).validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "discount_factor",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_kl_radius_rejected() {
        let err = valid_config().with_max_kl(0.0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "max_kl", .. }));
    }

    #[test]
    fn test_backtrack_ratio_bounds() {
        assert!(valid_config()
            .with_line_search_backtrack_ratio(1.0)
            .validate()
            .is_err());
        assert!(valid_config()
            .with_line_search_backtrack_ratio(0.0)
            .validate()
            .is_err());
        assert!(valid_config()
            .with_line_search_backtrack_ratio(0.5)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_uneven_minibatch_split_rejected() {
        // 16 * 4 = 64 transitions, 7 minibatches
        let err = valid_config().with_mini_batches(7).validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidMinibatch {
                transitions: 64,
                mini_batches: 7
            }
        );
    }

    #[test]
    fn test_build_returns_config() {
        let config = valid_config().build().unwrap();
        assert_eq!(config.rollout_capacity(), 64);
    }
}
