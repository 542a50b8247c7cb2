//! Trust-region policy step solver.
//!
//! One natural-gradient update: build the surrogate gradient g, solve
//! F x = g with conjugate gradient where F is the damped Fisher matrix of
//! the policy, scale the solution to the KL radius, then backtrack until
//! the candidate both improves the surrogate and respects the KL bound.
//!
//! The Fisher-vector product is computed without a second backward pass:
//! the gradient of the analytic KL to the frozen old distribution is zero
//! at the old parameters, so a forward difference of that gradient along v
//! equals F v to first order.
//!
//! All vector algebra runs in f64 on the host; tensors are only involved
//! in the surrogate and KL evaluations.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use log::warn;

use crate::nn::params::{collect_grads, flatten_params, write_flat_params};
use crate::nn::policy::StochasticPolicy;

/// Base perturbation for the finite-difference Fisher-vector product,
/// scaled by 1/||v||.
const FVP_EPS_BASE: f64 = 1e-5;

/// Residual threshold below which conjugate gradient stops early.
const CG_RESIDUAL_TOL: f64 = 1e-10;

/// Configuration for the trust-region solver.
#[derive(Debug, Clone)]
pub struct TrustRegionConfig {
    /// KL radius δ of the trust region.
    pub max_kl: f64,
    /// Conjugate gradient iterations.
    pub cg_iterations: usize,
    /// Damping added to the Fisher diagonal.
    pub cg_damping: f64,
    /// Multiplicative step shrink per backtrack.
    pub backtrack_ratio: f64,
    /// Number of line search trials before giving up.
    pub max_backtracks: usize,
}

impl TrustRegionConfig {
    /// Create a config with the given KL radius and standard solver settings.
    pub fn new(max_kl: f64) -> Self {
        Self {
            max_kl,
            cg_iterations: 10,
            cg_damping: 0.1,
            backtrack_ratio: 0.8,
            max_backtracks: 10,
        }
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

    /// Set the line search shrink ratio.
    pub fn with_backtrack_ratio(mut self, backtrack_ratio: f64) -> Self {
        self.backtrack_ratio = backtrack_ratio;
        self
    }

    /// Set the number of line search trials.
    pub fn with_max_backtracks(mut self, max_backtracks: usize) -> Self {
        self.max_backtracks = max_backtracks;
        self
    }
}

impl Default for TrustRegionConfig {
    fn default() -> Self {
        Self::new(0.01)
    }
}

/// How the solver resolved one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A candidate passed the line search and was applied.
    Accepted,
    /// No trial satisfied both acceptance criteria; parameters untouched.
    LineSearchExhausted,
    /// Non-finite gradient or non-positive curvature; cycle skipped.
    SkippedUnstable,
}

/// Diagnostics from one solver invocation.
#[derive(Debug, Clone)]
pub struct TrustRegionReport {
    /// Resolution of the cycle.
    pub outcome: StepOutcome,
    /// Realized mean KL between old and applied distribution. Zero when no
    /// step was applied.
    pub kl: f64,
    /// Surrogate objective gain of the applied step. Zero when no step was
    /// applied.
    pub surrogate_improvement: f64,
    /// Line search trials consumed before acceptance or exhaustion.
    pub backtracks: usize,
}

impl TrustRegionReport {
    fn no_step(outcome: StepOutcome, backtracks: usize) -> Self {
        Self {
            outcome,
            kl: 0.0,
            surrogate_improvement: 0.0,
            backtracks,
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve A x = b for symmetric positive definite A given only the
/// matrix-vector product.
///
/// Stops after `iterations` rounds or when the squared residual drops
/// below tolerance. Returns x = 0 for b = 0.
pub fn conjugate_gradient(
    mut matvec: impl FnMut(&[f64]) -> Vec<f64>,
    b: &[f64],
    iterations: usize,
) -> Vec<f64> {
    let mut x = vec![0.0; b.len()];
    let mut r = b.to_vec();
    let mut p = r.clone();
    let mut rdotr = dot(&r, &r);

    for _ in 0..iterations {
        if rdotr < CG_RESIDUAL_TOL {
            break;
        }

        let ap = matvec(&p);
        let alpha = rdotr / (dot(&p, &ap) + 1e-8);

        for i in 0..x.len() {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }

        let new_rdotr = dot(&r, &r);
        let beta = new_rdotr / rdotr;
        for i in 0..p.len() {
            p[i] = r[i] + beta * p[i];
        }
        rdotr = new_rdotr;
    }

    x
}

/// Backtracking line search over step scales `ratio^i`.
///
/// `evaluate` maps a step scale to `(surrogate_improvement, kl)`. The first
/// trial with finite values, positive improvement, and KL within bound is
/// accepted. Returns `(scale, improvement, kl, trials_used)`.
pub(crate) fn backtracking_line_search(
    mut evaluate: impl FnMut(f64) -> (f64, f64),
    max_kl: f64,
    backtrack_ratio: f64,
    max_backtracks: usize,
) -> Option<(f64, f64, f64, usize)> {
    for trial in 0..max_backtracks {
        let scale = backtrack_ratio.powi(trial as i32);
        let (improvement, kl) = evaluate(scale);

        if improvement.is_finite() && kl.is_finite() && improvement > 0.0 && kl <= max_kl {
            return Some((scale, improvement, kl, trial));
        }
    }

    None
}

/// Attempt one trust-region policy update.
///
/// Returns the updated policy and a report. On
/// [`StepOutcome::SkippedUnstable`] and [`StepOutcome::LineSearchExhausted`]
/// the returned policy is the input policy, parameters untouched.
pub fn trust_region_step<B: AutodiffBackend>(
    policy: StochasticPolicy<B>,
    observations: Tensor<B, 2>,
    actions: Tensor<B, 2>,
    old_log_probs: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    config: &TrustRegionConfig,
) -> (StochasticPolicy<B>, TrustRegionReport) {
    let device = observations.device();
    let dist = policy.distribution();

    let theta_old = flatten_params(&policy);

    // Frozen old distribution, the KL reference for FVP and line search.
    let (mean_old, log_std_old) = policy.forward(observations.clone());
    let mean_old = mean_old.detach();
    let log_std_old = log_std_old.detach();

    let surrogate = |candidate: &StochasticPolicy<B>| -> Tensor<B, 1> {
        let log_probs = candidate.log_prob(observations.clone(), actions.clone());
        let ratio = (log_probs - old_log_probs.clone()).exp();
        (ratio * advantages.clone()).mean()
    };

    let mean_kl = |candidate: &StochasticPolicy<B>| -> Tensor<B, 1> {
        let (mean_new, log_std_new) = candidate.forward(observations.clone());
        dist.kl(
            mean_old.clone(),
            log_std_old.clone(),
            mean_new,
            log_std_new,
        )
        .mean()
    };

    // Surrogate gradient at the old parameters.
    let surrogate_tensor = surrogate(&policy);
    let surrogate_old: f32 = surrogate_tensor.clone().into_scalar().elem();
    let grads = surrogate_tensor.backward();
    let g: Vec<f64> = collect_grads(&policy, &grads)
        .into_iter()
        .map(f64::from)
        .collect();

    if g.iter().any(|v| !v.is_finite()) {
        warn!("trust-region step skipped: non-finite surrogate gradient");
        return (
            policy,
            TrustRegionReport::no_step(StepOutcome::SkippedUnstable, 0),
        );
    }

    // Damped Fisher-vector product by forward difference of the KL gradient.
    let mut fvp = |v: &[f64]| -> Vec<f64> {
        let v_norm = dot(v, v).sqrt();
        let eps = FVP_EPS_BASE / (v_norm + 1e-8);

        let theta_pert: Vec<f32> = theta_old
            .iter()
            .zip(v)
            .map(|(t, vi)| t + (eps * vi) as f32)
            .collect();
        let perturbed = write_flat_params(policy.clone(), &theta_pert, &device);

        let kl_grads = mean_kl(&perturbed).backward();
        let kl_grad = collect_grads(&perturbed, &kl_grads);

        kl_grad
            .iter()
            .zip(v)
            .map(|(kg, vi)| f64::from(*kg) / eps + config.cg_damping * vi)
            .collect()
    };

    let step_dir = conjugate_gradient(&mut fvp, &g, config.cg_iterations);

    // Scale to the trust region boundary: β = sqrt(2δ / xᵀFx).
    let shs = dot(&step_dir, &fvp(&step_dir));
    if !shs.is_finite() || shs <= 0.0 {
        warn!(
            "trust-region step skipped: non-positive curvature (xᵀFx = {})",
            shs
        );
        return (
            policy,
            TrustRegionReport::no_step(StepOutcome::SkippedUnstable, 0),
        );
    }

    let beta = (2.0 * config.max_kl / shs).sqrt();

    let evaluate = |scale: f64| -> (f64, f64) {
        let theta_new: Vec<f32> = theta_old
            .iter()
            .zip(&step_dir)
            .map(|(t, d)| t + (scale * beta * d) as f32)
            .collect();
        let candidate = write_flat_params(policy.clone(), &theta_new, &device);

        let gain: f32 = surrogate(&candidate).into_scalar().elem();
        let kl: f32 = mean_kl(&candidate).into_scalar().elem();

        (f64::from(gain) - f64::from(surrogate_old), f64::from(kl))
    };

    match backtracking_line_search(
        evaluate,
        config.max_kl,
        config.backtrack_ratio,
        config.max_backtracks,
    ) {
        Some((scale, improvement, kl, trials)) => {
            let theta_new: Vec<f32> = theta_old
                .iter()
                .zip(&step_dir)
                .map(|(t, d)| t + (scale * beta * d) as f32)
                .collect();
            let updated = write_flat_params(policy, &theta_new, &device);

            (
                updated,
                TrustRegionReport {
                    outcome: StepOutcome::Accepted,
                    kl,
                    surrogate_improvement: improvement,
                    backtracks: trials,
                },
            )
        }
        None => (
            policy,
            TrustRegionReport::no_step(StepOutcome::LineSearchExhausted, config.max_backtracks),
        ),
    }
}
