//! Gaussian stochastic policy.
//!
//! MLP trunk feeding a mean head, with a state-independent learned log-std
//! parameter. The action distribution itself lives in
//! [`crate::algorithms::gaussian::DiagonalGaussian`]; the policy only
//! produces distribution parameters, so swapping the distribution does not
//! touch the network.

use burn::module::{Module, Param};
use burn::prelude::*;
use rand::Rng;

use crate::algorithms::gaussian::DiagonalGaussian;
use crate::nn::mlp::{Mlp, MlpConfig};

/// Configuration for the stochastic policy.
#[derive(Debug, Clone)]
pub struct StochasticPolicyConfig {
    /// Observation dimension.
    pub obs_dim: usize,
    /// Action dimension.
    pub action_dim: usize,
    /// Hidden layer widths of the trunk.
    pub hidden_sizes: Vec<usize>,
}

impl StochasticPolicyConfig {
    /// Create a new configuration.
    pub fn new(obs_dim: usize, action_dim: usize, hidden_sizes: Vec<usize>) -> Self {
        Self {
            obs_dim,
            action_dim,
            hidden_sizes,
        }
    }

    /// Initialize the policy. Log-std starts at zero (unit std).
    pub fn init<B: Backend>(&self, device: &B::Device) -> StochasticPolicy<B> {
        let trunk_config = MlpConfig::new(self.obs_dim, self.hidden_sizes.clone());
        let trunk = trunk_config.init(device);
        let mean_head =
            burn::nn::LinearConfig::new(trunk_config.output_dim(), self.action_dim).init(device);
        let log_std = Param::from_tensor(Tensor::zeros([self.action_dim], device));

        StochasticPolicy {
            trunk,
            mean_head,
            log_std,
            action_dim: self.action_dim,
        }
    }
}

/// Diagonal Gaussian policy over continuous actions.
#[derive(Module, Debug)]
pub struct StochasticPolicy<B: Backend> {
    trunk: Mlp<B>,
    mean_head: burn::nn::Linear<B>,
    /// Learned log standard deviation, one entry per action dimension.
    log_std: Param<Tensor<B, 1>>,
    action_dim: usize,
}

impl<B: Backend> StochasticPolicy<B> {
    /// Distribution parameters for a batch of observations.
    ///
    /// # Arguments
    /// * `observations` - Tensor of shape [batch_size, obs_dim]
    ///
    /// # Returns
    /// * `(mean, log_std)` both of shape [batch_size, action_dim], log-std
    ///   already clamped to the safe range
    pub fn forward(&self, observations: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let batch_size = observations.dims()[0];

        let features = self.trunk.forward(observations);
        let mean = self.mean_head.forward(features);

        let log_std: Tensor<B, 2> = self.log_std.val().unsqueeze_dim(0);
        let log_std = self
            .distribution()
            .clamp_log_std(log_std)
            .repeat_dim(0, batch_size);

        (mean, log_std)
    }

    /// Sample actions and their log probabilities for a batch.
    pub fn sample_actions<R: Rng>(
        &self,
        observations: Tensor<B, 2>,
        rng: &mut R,
    ) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let (mean, log_std) = self.forward(observations);
        self.distribution().sample(mean, log_std, rng)
    }

    /// Log probabilities of given actions under the current parameters.
    pub fn log_prob(&self, observations: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let (mean, log_std) = self.forward(observations);
        self.distribution().log_prob(actions, mean, log_std)
    }

    /// The action distribution strategy.
    pub fn distribution(&self) -> DiagonalGaussian {
        DiagonalGaussian
    }

    /// Action dimension.
    pub fn action_dim(&self) -> usize {
        self.action_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::gaussian::{LOG_STD_MAX, LOG_STD_MIN};
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let policy =
            StochasticPolicyConfig::new(4, 2, vec![8, 8]).init::<TestBackend>(&device);

        let obs: Tensor<TestBackend, 2> = Tensor::zeros([6, 4], &device);
        let (mean, log_std) = policy.forward(obs);

        assert_eq!(mean.dims(), [6, 2]);
        assert_eq!(log_std.dims(), [6, 2]);
    }

    #[test]
    fn test_initial_log_std_is_zero() {
        let device = Default::default();
        let policy = StochasticPolicyConfig::new(3, 2, vec![4]).init::<TestBackend>(&device);

        let obs: Tensor<TestBackend, 2> = Tensor::zeros([1, 3], &device);
        let (_, log_std) = policy.forward(obs);

        let data = log_std.into_data();
        for &v in data.as_slice::<f32>().unwrap() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_log_std_is_clamped() {
        let device = Default::default();
        let policy = StochasticPolicyConfig::new(3, 2, vec![4]).init::<TestBackend>(&device);

        let obs: Tensor<TestBackend, 2> = Tensor::zeros([2, 3], &device);
        let (_, log_std) = policy.forward(obs);

        let data = log_std.into_data();
        for &v in data.as_slice::<f32>().unwrap() {
            assert!(v >= LOG_STD_MIN && v <= LOG_STD_MAX);
        }
    }

    #[test]
    fn test_sample_actions_shapes() {
        let device = Default::default();
        let policy = StochasticPolicyConfig::new(4, 3, vec![8]).init::<TestBackend>(&device);
        let mut rng = StdRng::seed_from_u64(11);

        let obs: Tensor<TestBackend, 2> = Tensor::zeros([5, 4], &device);
        let (actions, log_probs) = policy.sample_actions(obs, &mut rng);

        assert_eq!(actions.dims(), [5, 3]);
        assert_eq!(log_probs.dims(), [5]);
    }
}
