//! Shared MLP backbone with tanh activations.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

/// Configuration for the MLP backbone.
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Number of input features.
    pub input_dim: usize,
    /// Width of each hidden layer, in order.
    pub hidden_sizes: Vec<usize>,
}

impl MlpConfig {
    /// Create a new configuration.
    pub fn new(input_dim: usize, hidden_sizes: Vec<usize>) -> Self {
        Self {
            input_dim,
            hidden_sizes,
        }
    }

    /// Number of output features (width of the last hidden layer).
    pub fn output_dim(&self) -> usize {
        *self
            .hidden_sizes
            .last()
            .unwrap_or(&self.input_dim)
    }

    /// Initialize the backbone.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let mut layers = Vec::with_capacity(self.hidden_sizes.len());
        let mut in_dim = self.input_dim;
        for &out_dim in &self.hidden_sizes {
            layers.push(LinearConfig::new(in_dim, out_dim).init(device));
            in_dim = out_dim;
        }

        Mlp { layers }
    }
}

/// Stack of linear layers with tanh after every layer.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> Mlp<B> {
    /// Forward pass.
    ///
    /// # Arguments
    /// * `input` - Tensor of shape [batch_size, input_dim]
    ///
    /// # Returns
    /// Features of shape [batch_size, output_dim]
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.layers {
            x = layer.forward(x).tanh();
        }
        x
    }
}
