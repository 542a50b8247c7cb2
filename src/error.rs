//! Error types for the training engine.
//!
//! Numerical failures during a policy update (bad curvature, exhausted line
//! search) are not represented here: they are contained within a single
//! update cycle, degrade to a no-op, and surface only through logs and
//! metrics. Only bookkeeping bugs, environment failures, and invalid
//! configuration are fatal.

use crate::checkpoint::CheckpointError;
use crate::trainer::config::ConfigError;

/// Buffer write outside the configured (time, env) bounds.
///
/// Always indicates a loop-bookkeeping bug in the caller, never a
/// recoverable runtime condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityError {
    /// Offending time index.
    pub time_index: usize,
    /// Offending environment index.
    pub env_index: usize,
    /// Configured rollout length.
    pub rollout_length: usize,
    /// Configured number of environments.
    pub num_envs: usize,
}

impl std::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rollout buffer write at (t={}, env={}) exceeds bounds ({} x {})",
            self.time_index, self.env_index, self.rollout_length, self.num_envs
        )
    }
}

impl std::error::Error for CapacityError {}

/// Failure reported by the environment collaborator.
///
/// The trainer must not continue with possibly corrupted observations, so
/// this always escalates to run termination.
#[derive(Debug, Clone)]
pub enum EnvError {
    /// Simulation failure (divergence, NaN state, backend fault).
    Simulation(String),
    /// Batch shapes from the environment did not match its declared dims.
    ShapeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::Simulation(msg) => write!(f, "environment failure: {}", msg),
            EnvError::ShapeMismatch { expected, actual } => {
                write!(f, "environment batch shape mismatch: expected {} elements, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for EnvError {}

/// Top-level error for a training run.
#[derive(Debug)]
pub enum TrainError {
    /// Invalid configuration, rejected at construction.
    Config(ConfigError),
    /// Rollout buffer bookkeeping bug.
    Capacity(CapacityError),
    /// Environment collaborator failure.
    Environment(EnvError),
    /// Checkpoint persistence failure.
    Checkpoint(CheckpointError),
}

impl std::fmt::Display for TrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainError::Config(e) => write!(f, "config error: {}", e),
            TrainError::Capacity(e) => write!(f, "capacity error: {}", e),
            TrainError::Environment(e) => write!(f, "{}", e),
            TrainError::Checkpoint(e) => write!(f, "checkpoint error: {}", e),
        }
    }
}

impl std::error::Error for TrainError {}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        TrainError::Config(e)
    }
}

impl From<CapacityError> for TrainError {
    fn from(e: CapacityError) -> Self {
        TrainError::Capacity(e)
    }
}

impl From<EnvError> for TrainError {
    fn from(e: EnvError) -> Self {
        TrainError::Environment(e)
    }
}

impl From<CheckpointError> for TrainError {
    fn from(e: CheckpointError) -> Self {
        TrainError::Checkpoint(e)
    }
}
