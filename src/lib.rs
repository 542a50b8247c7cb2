//! # TRPO: Trust Region Policy Optimization for Continuous Control
//!
//! On-policy training engine that collects vectorized rollouts and updates a
//! Gaussian policy under an explicit KL trust-region constraint instead of an
//! unconstrained gradient step.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Trainer Loop                          │
//! │                                                              │
//! │  VectorizedEnv ──step──▶ RolloutBuffer (time × env arena)    │
//! │        ▲                        │ full                       │
//! │        │                        ▼                            │
//! │   StochasticPolicy ◀── TrustRegionStep ◀── GAE               │
//! │        │                 (CG over FVPs,                      │
//! │        │                  line search)                       │
//! │   ValueFunction ◀── minibatch refit (Adam, KL-adaptive LR)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The optimization path is strictly single-threaded: one update cycle is
//! atomic with respect to parameter reads by the collection phase.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trpo_rl::{Trainer, TrpoConfig, ConsoleLogger};
//!
//! let config = TrpoConfig::new(obs_dim, action_dim)
//!     .with_rollout_length(32)
//!     .with_total_timesteps(320_000)
//!     .build()?;
//!
//! let mut trainer: Trainer<B> = Trainer::new(config, device)?;
//! let mut logger = ConsoleLogger::new();
//! trainer.run(&mut env, &mut logger)?;
//! ```

pub mod core;
pub mod buffers;
pub mod algorithms;
pub mod nn;
pub mod scheduling;
pub mod metrics;
pub mod checkpoint;
pub mod environment;
pub mod trainer;
pub mod error;

pub use crate::core::transition::Transition;
pub use crate::core::running_stats::{PreprocessorState, RunningMeanStd, RunningScalarStats};

pub use buffers::rollout_buffer::{RolloutBatch, RolloutBuffer, RolloutBufferConfig};

pub use algorithms::gae::{compute_gae, compute_gae_vectorized, normalize_advantages};
pub use algorithms::gaussian::DiagonalGaussian;
pub use algorithms::trust_region::{
    conjugate_gradient, trust_region_step, StepOutcome, TrustRegionConfig, TrustRegionReport,
};

pub use nn::mlp::{Mlp, MlpConfig};
pub use nn::policy::{StochasticPolicy, StochasticPolicyConfig};
pub use nn::value::{ValueFunction, ValueFunctionConfig};

pub use scheduling::kl_adaptive::KlAdaptiveLr;

pub use metrics::logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, TrainingSnapshot};

pub use checkpoint::{CheckpointError, Checkpointer, CheckpointerConfig};

pub use environment::{ResetMask, StepResult, VectorizedEnv};

pub use trainer::config::{ConfigError, TrpoConfig};
pub use trainer::{Trainer, TrainerPhase, TrainingSummary};

pub use error::{CapacityError, EnvError, TrainError};
