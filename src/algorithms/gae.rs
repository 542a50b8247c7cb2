//! Generalized Advantage Estimation.
//!
//! GAE provides a family of policy gradient estimators parameterized by λ:
//! - λ = 0: one-step TD (low variance, high bias)
//! - λ = 1: Monte Carlo (high variance, low bias)
//! - λ ∈ (0, 1): interpolation
//!
//! ## Formula
//!
//! A_t^GAE(γ,λ) = Σ_{l=0}^{∞} (γλ)^l δ_{t+l}
//! where δ_t = r_t + γ V(s_{t+1}) - V(s_t)
//!
//! ## Termination vs truncation
//!
//! The bootstrap term `γ V(s_{t+1})` is zeroed only at a true terminal: a
//! truncated episode still bootstraps from the value estimate of its final
//! observation (`next_values[t]`). The advantage recursion is cut at both
//! kinds of boundary so no credit leaks into the following episode.
//!
//! ## References
//!
//! - Schulman et al., "High-Dimensional Continuous Control Using
//!   Generalized Advantage Estimation" (2016)

/// Compute GAE advantages and returns for a single trajectory.
///
/// # Arguments
///
/// * `rewards` - rewards received [T]
/// * `values` - value estimates V(s_t) [T]
/// * `next_values` - value estimates V(s_{t+1}) of the post-step observation [T]
/// * `terminals` - true-termination flags [T]
/// * `truncations` - time-limit cutoff flags [T]
/// * `gamma` - discount factor
/// * `gae_lambda` - GAE λ parameter
///
/// # Returns
///
/// (advantages, returns) - both [T], with `returns[t] = advantages[t] + values[t]`
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    next_values: &[f32],
    terminals: &[bool],
    truncations: &[bool],
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n);
    assert_eq!(next_values.len(), n);
    assert_eq!(terminals.len(), n);
    assert_eq!(truncations.len(), n);

    let mut advantages = vec![0.0f32; n];
    let mut returns = vec![0.0f32; n];

    let mut gae = 0.0f32;

    for t in (0..n).rev() {
        let not_terminal = if terminals[t] { 0.0 } else { 1.0 };
        let not_done = if terminals[t] || truncations[t] { 0.0 } else { 1.0 };

        // TD residual: δ_t = r_t + γ * V(s_{t+1}) - V(s_t)
        let delta = rewards[t] + gamma * next_values[t] * not_terminal - values[t];

        // GAE: A_t = δ_t + γλ * A_{t+1}
        gae = delta + gamma * gae_lambda * not_done * gae;

        advantages[t] = gae;
        returns[t] = gae + values[t];
    }

    (advantages, returns)
}

/// Compute GAE for vectorized environments.
///
/// Transitions are stored interleaved: [env0_t0, env1_t0, ..., env0_t1, ...]
///
/// # Arguments
///
/// * `rewards`, `values`, `next_values`, `terminals`, `truncations` -
///   flat arrays [num_envs * rollout_len] in (time, env) slot order
/// * `num_envs` - number of parallel environments
/// * `gamma`, `gae_lambda` - discount and trace-decay parameters
///
/// # Returns
///
/// (advantages, returns) - both [num_envs * rollout_len], same layout
#[allow(clippy::too_many_arguments)]
pub fn compute_gae_vectorized(
    rewards: &[f32],
    values: &[f32],
    next_values: &[f32],
    terminals: &[bool],
    truncations: &[bool],
    num_envs: usize,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let total_len = rewards.len();
    assert_eq!(values.len(), total_len);
    assert_eq!(next_values.len(), total_len);
    assert_eq!(terminals.len(), total_len);
    assert_eq!(truncations.len(), total_len);
    assert_eq!(total_len % num_envs, 0);

    let rollout_len = total_len / num_envs;
    let mut advantages = vec![0.0f32; total_len];
    let mut returns = vec![0.0f32; total_len];

    for env_idx in 0..num_envs {
        // Extract this env's data
        let env_rewards: Vec<f32> = (0..rollout_len)
            .map(|t| rewards[t * num_envs + env_idx])
            .collect();
        let env_values: Vec<f32> = (0..rollout_len)
            .map(|t| values[t * num_envs + env_idx])
            .collect();
        let env_next_values: Vec<f32> = (0..rollout_len)
            .map(|t| next_values[t * num_envs + env_idx])
            .collect();
        let env_terminals: Vec<bool> = (0..rollout_len)
            .map(|t| terminals[t * num_envs + env_idx])
            .collect();
        let env_truncations: Vec<bool> = (0..rollout_len)
            .map(|t| truncations[t * num_envs + env_idx])
            .collect();

        let (env_advantages, env_returns) = compute_gae(
            &env_rewards,
            &env_values,
            &env_next_values,
            &env_terminals,
            &env_truncations,
            gamma,
            gae_lambda,
        );

        // Write back to interleaved layout
        for t in 0..rollout_len {
            advantages[t * num_envs + env_idx] = env_advantages[t];
            returns[t * num_envs + env_idx] = env_returns[t];
        }
    }

    (advantages, returns)
}

/// Normalize advantages to zero mean and unit variance.
///
/// # Edge Cases
///
/// - Empty slice: no-op
/// - Single element: sets to 0.0 (can't compute meaningful variance)
/// - All same values: sets all to 0.0 (variance is 0, epsilon prevents NaN)
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }

    if advantages.len() == 1 {
        advantages[0] = 0.0;
        return;
    }

    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    // Population variance with epsilon for stability
    let variance = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n;
    let std = (variance + 1e-8).sqrt();

    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO: [bool; 3] = [false, false, false];

    #[test]
    fn test_returns_equal_advantages_plus_values() {
        let rewards = vec![1.0, -0.5, 2.0];
        let values = vec![0.5, 0.8, 0.1];
        let next_values = vec![0.8, 0.1, 0.6];

        let (advantages, returns) =
            compute_gae(&rewards, &values, &next_values, &NO, &NO, 0.99, 0.95);

        assert_eq!(advantages.len(), 3);
        assert_eq!(returns.len(), 3);
        for t in 0..3 {
            assert!(
                (returns[t] - (advantages[t] + values[t])).abs() < 1e-6,
                "return[{t}] != advantage[{t}] + value[{t}]"
            );
        }
    }

    #[test]
    fn test_zero_discount_gives_single_step_estimate() {
        let rewards = vec![1.0, 2.0, 3.0];
        let values = vec![0.5, 0.7, 0.9];
        let next_values = vec![0.7, 0.9, 0.4];

        let (advantages, _) = compute_gae(&rewards, &values, &next_values, &NO, &NO, 0.0, 0.95);

        // γ=0: A_t = r_t - V(s_t), no bootstrap, no accumulation
        for t in 0..3 {
            assert!(
                (advantages[t] - (rewards[t] - values[t])).abs() < 1e-6,
                "gamma=0 should give r_t - V(s_t) at t={t}"
            );
        }
    }

    #[test]
    fn test_lambda_extremes_on_known_trajectory() {
        // 5-step trajectory with known rewards/values, no episode boundary
        let rewards = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let values = vec![0.5, 1.0, 1.5, 2.0, 2.5];
        let next_values = vec![1.0, 1.5, 2.0, 2.5, 3.0];
        let none = [false; 5];
        let gamma = 0.9f32;

        // λ = 0 collapses to the one-step TD residual
        let (adv_td, _) =
            compute_gae(&rewards, &values, &next_values, &none, &none, gamma, 0.0);
        for t in 0..5 {
            let delta = rewards[t] + gamma * next_values[t] - values[t];
            assert!((adv_td[t] - delta).abs() < 1e-5, "lambda=0 mismatch at t={t}");
        }

        // λ = 1 collapses to Monte-Carlo advantage: discounted return minus baseline
        let (adv_mc, _) =
            compute_gae(&rewards, &values, &next_values, &none, &none, gamma, 1.0);
        for t in 0..5 {
            let mut g = 0.0f32;
            for (l, &r) in rewards[t..].iter().enumerate() {
                g += gamma.powi(l as i32) * r;
            }
            // Tail bootstrap from the final next_value
            g += gamma.powi((5 - t) as i32) * next_values[4];
            assert!(
                (adv_mc[t] - (g - values[t])).abs() < 1e-4,
                "lambda=1 mismatch at t={t}: {} vs {}",
                adv_mc[t],
                g - values[t]
            );
        }
    }

    #[test]
    fn test_terminal_zeroes_bootstrap() {
        let rewards = vec![1.0, 1.0, 0.0];
        let values = vec![0.5, 0.5, 0.0];
        // next_values[2] is deliberately nonzero; terminal must ignore it
        let next_values = vec![0.5, 0.0, 7.0];
        let terminals = vec![false, false, true];
        let truncations = vec![false, false, false];

        let (advantages, _) = compute_gae(
            &rewards, &values, &next_values, &terminals, &truncations, 0.99, 0.95,
        );

        // Last step: δ = 0 + 0 - 0 = 0 (bootstrap zeroed despite next_value=7)
        assert!(advantages[2].abs() < 1e-6, "got {}", advantages[2]);
    }

    #[test]
    fn test_truncation_bootstraps_from_last_value() {
        let rewards = vec![1.0, 1.0];
        let values = vec![0.0, 0.0];
        let next_values = vec![0.0, 3.0];
        let terminals = vec![false, false];
        let truncations = vec![false, true];
        let gamma = 0.5f32;

        let (advantages, _) = compute_gae(
            &rewards, &values, &next_values, &terminals, &truncations, gamma, 1.0,
        );

        // Truncated step still bootstraps: δ_1 = 1 + 0.5*3 - 0 = 2.5
        assert!((advantages[1] - 2.5).abs() < 1e-6, "got {}", advantages[1]);
    }

    #[test]
    fn test_truncation_cuts_recursion() {
        // Step 0 truncates; step 1 belongs to a new episode and must not
        // receive any credit from it
        let rewards = vec![0.0, 100.0];
        let values = vec![0.0, 0.0];
        let next_values = vec![0.0, 0.0];
        let terminals = vec![false, false];
        let truncations = vec![true, false];

        let (advantages, _) = compute_gae(
            &rewards, &values, &next_values, &terminals, &truncations, 0.99, 0.95,
        );

        assert!(advantages[0].abs() < 1e-6, "credit leaked across truncation");
    }

    #[test]
    fn test_vectorized_end_to_end_analytic() {
        // rollout_length=4, num_envs=2, constant reward 1, zero values,
        // env 0 terminates at t=2, env 1 never ends.
        let n_envs = 2;
        let rollout_len = 4;
        let gamma = 0.99f32;
        let lambda = 0.95f32;
        let total = n_envs * rollout_len;

        let rewards = vec![1.0f32; total];
        let values = vec![0.0f32; total];
        let next_values = vec![0.0f32; total];
        let mut terminals = vec![false; total];
        terminals[2 * n_envs] = true; // env 0 at t=2
        let truncations = vec![false; total];

        let (advantages, returns) = compute_gae_vectorized(
            &rewards, &values, &next_values, &terminals, &truncations, n_envs, gamma, lambda,
        );

        // With zero values, δ_t = 1 everywhere and A follows the (γλ) series
        let gl = gamma * lambda;
        let at = |t: usize, env: usize| advantages[t * n_envs + env];

        // env 1: A_t = Σ_{l=0}^{3-t} (γλ)^l
        for t in 0..rollout_len {
            let expected: f32 = (0..rollout_len - t).map(|l| gl.powi(l as i32)).sum();
            assert!(
                (at(t, 1) - expected).abs() < 1e-5,
                "env1 t={t}: {} vs {expected}",
                at(t, 1)
            );
        }

        // env 0: series restarts after the terminal at t=2
        assert!((at(3, 0) - 1.0).abs() < 1e-5);
        assert!((at(2, 0) - 1.0).abs() < 1e-5);
        assert!((at(1, 0) - (1.0 + gl)).abs() < 1e-5);
        assert!((at(0, 0) - (1.0 + gl * (1.0 + gl))).abs() < 1e-5);

        // returns = advantages + values holds slot-for-slot
        for i in 0..total {
            assert!((returns[i] - (advantages[i] + values[i])).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_advantages() {
        let mut advantages = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        normalize_advantages(&mut advantages);

        let mean: f32 = advantages.iter().sum::<f32>() / advantages.len() as f32;
        assert!(mean.abs() < 1e-6, "Expected mean~0, got {}", mean);

        let variance: f32 =
            advantages.iter().map(|a| a.powi(2)).sum::<f32>() / advantages.len() as f32;
        assert!((variance.sqrt() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_advantages_degenerate() {
        let mut empty: Vec<f32> = vec![];
        normalize_advantages(&mut empty);
        assert!(empty.is_empty());

        let mut single = vec![5.0];
        normalize_advantages(&mut single);
        assert!(single[0].abs() < 1e-6);
    }
}
