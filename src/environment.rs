//! Environment abstraction for vectorized continuous-control training.
//!
//! All environment instances advance in lockstep per timestep; the trainer
//! indexes its rollout buffer by (time, env) on that assumption.

use crate::error::EnvError;

/// Result from stepping vectorized environments.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observations after step [n_envs * obs_size] (flattened).
    ///
    /// For environments that ended this step these are the final
    /// observations of the episode, not reset observations. Resetting is
    /// the caller's responsibility via [`VectorizedEnv::reset_envs`].
    pub observations: Vec<f32>,
    /// Rewards received [n_envs].
    pub rewards: Vec<f32>,
    /// Terminal flags (episode ended due to goal/failure) [n_envs].
    pub terminals: Vec<bool>,
    /// Truncation flags (episode ended due to time limit) [n_envs].
    pub truncations: Vec<bool>,
}

impl StepResult {
    /// Create a new step result.
    pub fn new(
        observations: Vec<f32>,
        rewards: Vec<f32>,
        terminals: Vec<bool>,
        truncations: Vec<bool>,
    ) -> Self {
        Self {
            observations,
            rewards,
            terminals,
            truncations,
        }
    }

    /// Get done flags (terminal OR truncated).
    pub fn dones(&self) -> Vec<bool> {
        self.terminals
            .iter()
            .zip(self.truncations.iter())
            .map(|(&t, &tr)| t || tr)
            .collect()
    }
}

/// Mask indicating which environments need reset.
pub struct ResetMask {
    mask: Vec<bool>,
}

impl ResetMask {
    /// Create from done flags.
    pub fn from_dones(dones: &[bool]) -> Self {
        Self {
            mask: dones.to_vec(),
        }
    }

    /// Create from step result.
    pub fn from_step_result(result: &StepResult) -> Self {
        Self::from_dones(&result.dones())
    }

    /// Check if any environment needs reset.
    pub fn any(&self) -> bool {
        self.mask.iter().any(|&x| x)
    }

    /// Get the underlying mask.
    pub fn as_slice(&self) -> &[bool] {
        &self.mask
    }

    /// Number of environments that need reset.
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&x| x).count()
    }
}

/// Trait for vectorized continuous-control environments.
///
/// Actions are flat batches of continuous vectors:
/// `[env0_action, env1_action, ...]` with `action_size` elements each.
///
/// Implementations must NOT auto-reset ended environments: the trainer
/// needs the final observation of a truncated episode to bootstrap its
/// value estimate before resetting.
pub trait VectorizedEnv {
    /// Number of parallel environments.
    fn n_envs(&self) -> usize;

    /// Size of observation vector for a single environment.
    fn obs_size(&self) -> usize;

    /// Size of action vector for a single environment.
    fn action_size(&self) -> usize;

    /// Write current observations to buffer.
    ///
    /// Buffer must have size `n_envs * obs_size`; layout is
    /// `[env0_obs, env1_obs, ...]`.
    fn write_observations(&self, buffer: &mut [f32]);

    /// Step all environments with the given action batch.
    ///
    /// A failure here means the simulation state can no longer be trusted
    /// and the training run must terminate.
    fn step(&mut self, actions: &[f32]) -> Result<StepResult, EnvError>;

    /// Reset the environments indicated by the mask.
    fn reset_envs(&mut self, mask: &ResetMask, seed: u64) -> Result<(), EnvError>;

    /// Reset all environments.
    fn reset_all(&mut self, seed: u64) -> Result<(), EnvError>;

    /// Get current observations as a new vector.
    fn get_observations(&self) -> Vec<f32> {
        let mut buffer = vec![0.0f32; self.n_envs() * self.obs_size()];
        self.write_observations(&mut buffer);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_dones() {
        let result = StepResult::new(
            vec![0.0; 6],
            vec![1.0, 1.0, 1.0],
            vec![true, false, false],
            vec![false, true, false],
        );
        assert_eq!(result.dones(), vec![true, true, false]);
    }

    #[test]
    fn test_reset_mask() {
        let mask = ResetMask::from_dones(&[true, false, true]);
        assert!(mask.any());
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.as_slice(), &[true, false, true]);

        let empty = ResetMask::from_dones(&[false, false]);
        assert!(!empty.any());
        assert_eq!(empty.count(), 0);
    }
}
