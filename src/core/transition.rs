//! Per-step transition record for continuous control.

use std::fmt::Debug;

/// One environment step as recorded by the collection phase.
///
/// `value` is the estimate of the current observation at decision time;
/// `next_value` is the estimate of the observation `step` returned, taken
/// before any reset. At a truncation boundary `next_value` is exactly the
/// bootstrap the advantage estimator needs.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation the action was chosen from (as seen by the policy).
    pub observation: Vec<f32>,
    /// Continuous action vector taken.
    pub action: Vec<f32>,
    /// Log probability of the action under the behavior policy.
    pub log_prob: f32,
    /// Reward received.
    pub reward: f32,
    /// Value estimate V(s_t).
    pub value: f32,
    /// Value estimate V(s_{t+1}) of the post-step observation.
    pub next_value: f32,
    /// Episode terminated (goal reached, failure, etc.).
    pub terminal: bool,
    /// Episode truncated (time limit, etc.).
    pub truncated: bool,
}

impl Transition {
    /// Create a new transition.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        observation: Vec<f32>,
        action: Vec<f32>,
        log_prob: f32,
        reward: f32,
        value: f32,
        next_value: f32,
        terminal: bool,
        truncated: bool,
    ) -> Self {
        Self {
            observation,
            action,
            log_prob,
            reward,
            value,
            next_value,
            terminal,
            truncated,
        }
    }

    /// Check if the episode ended (terminal or truncated).
    pub fn done(&self) -> bool {
        self.terminal || self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_done() {
        let t = Transition::new(vec![0.0], vec![0.5], -0.9, 1.0, 0.2, 0.3, false, false);
        assert!(!t.done());

        let terminal = Transition::new(vec![0.0], vec![0.5], -0.9, 1.0, 0.2, 0.0, true, false);
        assert!(terminal.done());

        let truncated = Transition::new(vec![0.0], vec![0.5], -0.9, 1.0, 0.2, 0.3, false, true);
        assert!(truncated.done());
        assert!(!truncated.terminal);
    }
}
