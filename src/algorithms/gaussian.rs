//! Diagonal Gaussian action distribution.
//!
//! The policy produces a mean vector per observation and a learned,
//! state-independent log standard deviation per action dimension. Sampling,
//! densities, entropy, and KL divergence are all independent per dimension
//! and summed.
//!
//! Noise is drawn from an explicitly passed RNG rather than a backend or
//! process-global generator, so a seeded run is reproducible end to end.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use rand_distr::StandardNormal;

/// Lower clamp on log standard deviation.
pub const LOG_STD_MIN: f32 = -20.0;
/// Upper clamp on log standard deviation.
pub const LOG_STD_MAX: f32 = 2.0;

/// Distribution strategy for diagonal Gaussian policies.
///
/// Stateless; carried by value inside a policy so a different action
/// distribution can be slotted in without touching the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagonalGaussian;

impl DiagonalGaussian {
    /// Clamp log-std into the numerically safe range.
    pub fn clamp_log_std<B: Backend>(&self, log_std: Tensor<B, 2>) -> Tensor<B, 2> {
        log_std.clamp(LOG_STD_MIN, LOG_STD_MAX)
    }

    /// Sample actions via reparameterization with host-side noise.
    ///
    /// # Arguments
    /// * `mean` - Mean of the Gaussian: [batch_size, action_dim]
    /// * `log_std` - Log standard deviation: [batch_size, action_dim]
    /// * `rng` - Explicit noise source
    ///
    /// # Returns
    /// * `(samples, log_probs)` with shapes [batch_size, action_dim] and [batch_size]
    pub fn sample<B: Backend, R: Rng>(
        &self,
        mean: Tensor<B, 2>,
        log_std: Tensor<B, 2>,
        rng: &mut R,
    ) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let device = mean.device();
        let dims = mean.dims();
        let batch_size = dims[0];
        let action_dim = dims[1];

        let log_std = self.clamp_log_std(log_std);
        let std = log_std.clone().exp();

        let noise_host: Vec<f32> = (0..batch_size * action_dim)
            .map(|_| rng.sample(StandardNormal))
            .collect();
        let noise: Tensor<B, 2> = Tensor::<B, 1>::from_floats(noise_host.as_slice(), &device)
            .reshape([batch_size, action_dim]);

        // Reparameterization: sample = mean + std * noise
        let samples = mean + std * noise.clone();

        // log N(x; μ, σ) = -0.5 * ((x - μ)/σ)² - log(σ) - 0.5 * log(2π)
        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let normalized = noise; // (samples - mean) / std = noise
        let log_prob_per_dim: Tensor<B, 2> =
            -0.5 * normalized.powf_scalar(2.0) - log_std - 0.5 * log_2pi;

        let log_probs: Tensor<B, 1> = log_prob_per_dim.sum_dim(1).squeeze_dims(&[1]);

        (samples, log_probs)
    }

    /// Log probability of given actions under the distribution.
    ///
    /// # Returns
    /// * `log_probs` - [batch_size], summed over action dimensions
    pub fn log_prob<B: Backend>(
        &self,
        actions: Tensor<B, 2>,
        mean: Tensor<B, 2>,
        log_std: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let log_std = self.clamp_log_std(log_std);
        let std = log_std.clone().exp();

        let normalized = (actions - mean) / std;
        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let log_prob_per_dim: Tensor<B, 2> =
            -0.5 * normalized.powf_scalar(2.0) - log_std - 0.5 * log_2pi;

        log_prob_per_dim.sum_dim(1).squeeze_dims(&[1])
    }

    /// Analytic entropy: H = 0.5 * D * (1 + log(2π)) + Σ log(σ).
    ///
    /// # Returns
    /// * `entropy` - Per-sample entropy: [batch_size]
    pub fn entropy<B: Backend>(&self, log_std: Tensor<B, 2>) -> Tensor<B, 1> {
        let log_std = self.clamp_log_std(log_std);
        let action_dim = log_std.dims()[1] as f32;

        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let constant = 0.5 * action_dim * (1.0 + log_2pi);

        let sum_log_std: Tensor<B, 1> = log_std.sum_dim(1).squeeze_dims(&[1]);

        sum_log_std.add_scalar(constant)
    }

    /// Analytic KL(old || new) per sample, summed over action dimensions.
    ///
    /// Per dimension:
    /// KL = log(σ₁/σ₀) + (σ₀² + (μ₀ - μ₁)²) / (2σ₁²) - 0.5
    ///
    /// # Returns
    /// * `kl` - [batch_size]
    pub fn kl<B: Backend>(
        &self,
        old_mean: Tensor<B, 2>,
        old_log_std: Tensor<B, 2>,
        new_mean: Tensor<B, 2>,
        new_log_std: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let old_log_std = self.clamp_log_std(old_log_std);
        let new_log_std = self.clamp_log_std(new_log_std);

        let var_old = old_log_std.clone().mul_scalar(2.0).exp();
        let var_new = new_log_std.clone().mul_scalar(2.0).exp();

        let mean_diff_sq = (old_mean - new_mean).powf_scalar(2.0);
        let kl_per_dim: Tensor<B, 2> = (new_log_std - old_log_std)
            + (var_old + mean_diff_sq) / var_new.mul_scalar(2.0)
            - 0.5;

        kl_per_dim.sum_dim(1).squeeze_dims(&[1])
    }
}
