//! Fixed-capacity rollout buffer for on-policy collection.
//!
//! The buffer is a flat arena indexed by (time, env): slot offset is
//! `time * num_envs + env`. All storage is allocated once at construction;
//! `clear` only resets the write bookkeeping. One full cycle stores exactly
//! `rollout_length * num_envs` transitions.

use crate::core::transition::Transition;
use crate::error::CapacityError;

/// Configuration for the rollout buffer.
#[derive(Debug, Clone)]
pub struct RolloutBufferConfig {
    /// Timesteps per rollout cycle.
    pub rollout_length: usize,
    /// Number of lockstep parallel environments.
    pub num_envs: usize,
    /// Observation dimension per environment.
    pub obs_dim: usize,
    /// Action dimension per environment.
    pub action_dim: usize,
}

impl RolloutBufferConfig {
    /// Create a new config.
    pub fn new(rollout_length: usize, num_envs: usize, obs_dim: usize, action_dim: usize) -> Self {
        Self {
            rollout_length,
            num_envs,
            obs_dim,
            action_dim,
        }
    }

    /// Total transitions per full cycle.
    pub fn capacity(&self) -> usize {
        self.rollout_length * self.num_envs
    }
}

/// Flat arena of transitions for one rollout cycle.
pub struct RolloutBuffer {
    config: RolloutBufferConfig,
    observations: Vec<f32>,
    actions: Vec<f32>,
    log_probs: Vec<f32>,
    rewards: Vec<f32>,
    values: Vec<f32>,
    next_values: Vec<f32>,
    terminals: Vec<bool>,
    truncations: Vec<bool>,
    written: Vec<bool>,
    filled: usize,
}

impl RolloutBuffer {
    /// Allocate a buffer with the configured fixed shape.
    pub fn new(config: RolloutBufferConfig) -> Self {
        let capacity = config.capacity();
        Self {
            observations: vec![0.0; capacity * config.obs_dim],
            actions: vec![0.0; capacity * config.action_dim],
            log_probs: vec![0.0; capacity],
            rewards: vec![0.0; capacity],
            values: vec![0.0; capacity],
            next_values: vec![0.0; capacity],
            terminals: vec![false; capacity],
            truncations: vec![false; capacity],
            written: vec![false; capacity],
            filled: 0,
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RolloutBufferConfig {
        &self.config
    }

    /// Total transitions per full cycle.
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Slot offset for a (time, env) pair.
    #[inline]
    fn offset(&self, time_index: usize, env_index: usize) -> usize {
        time_index * self.config.num_envs + env_index
    }

    /// Store a transition at (time, env).
    ///
    /// Fails with [`CapacityError`] if either index exceeds the configured
    /// bounds; that is a loop-bookkeeping bug in the caller.
    pub fn record(
        &mut self,
        transition: &Transition,
        env_index: usize,
        time_index: usize,
    ) -> Result<(), CapacityError> {
        if time_index >= self.config.rollout_length || env_index >= self.config.num_envs {
            return Err(CapacityError {
                time_index,
                env_index,
                rollout_length: self.config.rollout_length,
                num_envs: self.config.num_envs,
            });
        }

        debug_assert_eq!(transition.observation.len(), self.config.obs_dim);
        debug_assert_eq!(transition.action.len(), self.config.action_dim);

        let slot = self.offset(time_index, env_index);

        let obs_start = slot * self.config.obs_dim;
        self.observations[obs_start..obs_start + self.config.obs_dim]
            .copy_from_slice(&transition.observation);
        let act_start = slot * self.config.action_dim;
        self.actions[act_start..act_start + self.config.action_dim]
            .copy_from_slice(&transition.action);

        self.log_probs[slot] = transition.log_prob;
        self.rewards[slot] = transition.reward;
        self.values[slot] = transition.value;
        self.next_values[slot] = transition.next_value;
        self.terminals[slot] = transition.terminal;
        self.truncations[slot] = transition.truncated;

        if !self.written[slot] {
            self.written[slot] = true;
            self.filled += 1;
        }

        Ok(())
    }

    /// Whether `rollout_length` timesteps have been written for every env.
    pub fn is_full(&self) -> bool {
        self.filled == self.capacity()
    }

    /// Number of distinct slots written this cycle.
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Whether no slots have been written this cycle.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Return the whole cycle as flat arrays aligned by (time, env).
    ///
    /// # Panics
    /// Panics if called before `is_full()`; sampling a partial cycle is a
    /// contract violation, not a recoverable state.
    pub fn sample_all(&self) -> RolloutBatch {
        assert!(
            self.is_full(),
            "sample_all called on a partial rollout ({}/{} slots written)",
            self.filled,
            self.capacity()
        );

        RolloutBatch {
            observations: self.observations.clone(),
            actions: self.actions.clone(),
            log_probs: self.log_probs.clone(),
            rewards: self.rewards.clone(),
            values: self.values.clone(),
            next_values: self.next_values.clone(),
            terminals: self.terminals.clone(),
            truncations: self.truncations.clone(),
            num_envs: self.config.num_envs,
            obs_dim: self.config.obs_dim,
            action_dim: self.config.action_dim,
        }
    }

    /// Reset the write bookkeeping without deallocating storage.
    pub fn clear(&mut self) {
        self.written.fill(false);
        self.filled = 0;
    }
}

/// One full rollout cycle as flat arrays, slot order `time * num_envs + env`.
#[derive(Debug, Clone)]
pub struct RolloutBatch {
    observations: Vec<f32>,
    actions: Vec<f32>,
    log_probs: Vec<f32>,
    rewards: Vec<f32>,
    values: Vec<f32>,
    next_values: Vec<f32>,
    terminals: Vec<bool>,
    truncations: Vec<bool>,
    num_envs: usize,
    obs_dim: usize,
    action_dim: usize,
}

impl RolloutBatch {
    /// Flattened observations [capacity * obs_dim].
    pub fn observations(&self) -> &[f32] {
        &self.observations
    }

    /// Flattened actions [capacity * action_dim].
    pub fn actions(&self) -> &[f32] {
        &self.actions
    }

    /// Behavior-policy log probabilities [capacity].
    pub fn log_probs(&self) -> &[f32] {
        &self.log_probs
    }

    /// Rewards [capacity].
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Value estimates at decision time [capacity].
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Post-step value estimates [capacity].
    pub fn next_values(&self) -> &[f32] {
        &self.next_values
    }

    /// Terminal flags [capacity].
    pub fn terminals(&self) -> &[bool] {
        &self.terminals
    }

    /// Truncation flags [capacity].
    pub fn truncations(&self) -> &[bool] {
        &self.truncations
    }

    /// Number of parallel environments.
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Observation dimension.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Action dimension.
    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.log_probs.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.log_probs.is_empty()
    }
}
