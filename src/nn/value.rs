//! State-value function approximator.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

use crate::nn::mlp::{Mlp, MlpConfig};

/// Configuration for the value function.
#[derive(Debug, Clone)]
pub struct ValueFunctionConfig {
    /// Observation dimension.
    pub obs_dim: usize,
    /// Hidden layer widths of the trunk.
    pub hidden_sizes: Vec<usize>,
}

impl ValueFunctionConfig {
    /// Create a new configuration.
    pub fn new(obs_dim: usize, hidden_sizes: Vec<usize>) -> Self {
        Self {
            obs_dim,
            hidden_sizes,
        }
    }

    /// Initialize the value function.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ValueFunction<B> {
        let trunk_config = MlpConfig::new(self.obs_dim, self.hidden_sizes.clone());
        let trunk = trunk_config.init(device);
        let head = LinearConfig::new(trunk_config.output_dim(), 1).init(device);

        ValueFunction { trunk, head }
    }
}

/// MLP trunk with a scalar head.
#[derive(Module, Debug)]
pub struct ValueFunction<B: Backend> {
    trunk: Mlp<B>,
    head: Linear<B>,
}

impl<B: Backend> ValueFunction<B> {
    /// Predict state values.
    ///
    /// # Arguments
    /// * `observations` - Tensor of shape [batch_size, obs_dim]
    ///
    /// # Returns
    /// Values of shape [batch_size]
    pub fn forward(&self, observations: Tensor<B, 2>) -> Tensor<B, 1> {
        let features = self.trunk.forward(observations);
        self.head.forward(features).flatten(0, 1)
    }
}
