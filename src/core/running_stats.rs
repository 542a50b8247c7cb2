//! Running statistics using Welford's online algorithm.
//!
//! Numerically stable computation of running mean and variance for
//! observation and value-target standardization. Statistics persist for the
//! whole run: they are a slowly-converging estimate of the training
//! distribution and are never reset between optimization cycles.
//!
//! # Example
//! ```ignore
//! use trpo_rl::core::running_stats::RunningMeanStd;
//!
//! let mut stats = RunningMeanStd::new(4); // 4-dim observations
//! stats.update(&[1.0, 2.0, 3.0, 4.0]);
//! stats.update(&[2.0, 3.0, 4.0, 5.0]);
//!
//! let normalized = stats.normalize(&[1.5, 2.5, 3.5, 4.5]);
//! ```

use serde::{Deserialize, Serialize};

/// Running mean and standard deviation using Welford's online algorithm.
///
/// Maintains per-dimension statistics for normalizing multi-dimensional
/// data. Numerically stable even for large sample counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningMeanStd {
    /// Running mean per dimension
    mean: Vec<f64>,
    /// Running variance (sum of squared deviations) per dimension
    /// Note: actual variance = var_sum / count
    var_sum: Vec<f64>,
    /// Number of samples seen
    count: f64,
    /// Epsilon for numerical stability
    epsilon: f64,
}

impl RunningMeanStd {
    /// Create a new RunningMeanStd for the given dimensionality.
    pub fn new(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            var_sum: vec![0.0; dim],
            count: 0.0,
            epsilon: 1e-8,
        }
    }

    /// Create with a custom epsilon for numerical stability.
    pub fn with_epsilon(dim: usize, epsilon: f64) -> Self {
        Self {
            mean: vec![0.0; dim],
            var_sum: vec![0.0; dim],
            count: 0.0,
            epsilon,
        }
    }

    /// Update statistics with a single observation using Welford's algorithm.
    ///
    /// # Panics
    /// Panics if observation dimensionality doesn't match.
    pub fn update(&mut self, obs: &[f32]) {
        assert_eq!(obs.len(), self.mean.len(), "Observation dimension mismatch");

        self.count += 1.0;
        for i in 0..obs.len() {
            let x = obs[i] as f64;
            let delta = x - self.mean[i];
            self.mean[i] += delta / self.count;
            let delta2 = x - self.mean[i];
            self.var_sum[i] += delta * delta2;
        }
    }

    /// Update statistics with a batch of observations.
    ///
    /// # Arguments
    /// * `batch` - Flattened batch [obs1, obs2, ...] where each obs has `dim` elements
    pub fn update_batch(&mut self, batch: &[f32]) {
        let dim = self.mean.len();
        assert_eq!(batch.len() % dim, 0, "Batch size must be multiple of dimension");

        for obs in batch.chunks_exact(dim) {
            self.update(obs);
        }
    }

    /// Normalize an observation to zero mean and unit variance.
    pub fn normalize(&self, obs: &[f32]) -> Vec<f32> {
        assert_eq!(obs.len(), self.mean.len(), "Observation dimension mismatch");

        obs.iter()
            .enumerate()
            .map(|(i, &x)| {
                let std = self.std(i);
                ((x as f64 - self.mean[i]) / std) as f32
            })
            .collect()
    }

    /// Normalize and clip to a range.
    ///
    /// Clipping keeps extreme outliers early in training from destabilizing
    /// the networks.
    pub fn normalize_and_clip(&self, obs: &[f32], clip_range: (f32, f32)) -> Vec<f32> {
        self.normalize(obs)
            .into_iter()
            .map(|x| x.clamp(clip_range.0, clip_range.1))
            .collect()
    }

    /// Normalize a flattened batch of observations, with clipping.
    pub fn normalize_batch_and_clip(&self, batch: &[f32], clip_range: (f32, f32)) -> Vec<f32> {
        let dim = self.mean.len();
        assert_eq!(batch.len() % dim, 0, "Batch size must be multiple of dimension");

        let mut out = Vec::with_capacity(batch.len());
        for obs in batch.chunks_exact(dim) {
            out.extend(self.normalize_and_clip(obs, clip_range));
        }
        out
    }

    /// Get the standard deviation for dimension i.
    #[inline]
    fn std(&self, i: usize) -> f64 {
        if self.count < 2.0 {
            1.0 // Avoid division issues with small sample counts
        } else {
            (self.var_sum[i] / self.count).sqrt().max(self.epsilon)
        }
    }

    /// Get the mean vector.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Get the variance vector (population variance).
    pub fn variance(&self) -> Vec<f64> {
        if self.count < 2.0 {
            vec![1.0; self.mean.len()]
        } else {
            self.var_sum.iter().map(|&v| v / self.count).collect()
        }
    }

    /// Get the standard deviation vector.
    pub fn std_vec(&self) -> Vec<f64> {
        self.variance().into_iter().map(|v| v.sqrt().max(self.epsilon)).collect()
    }

    /// Get the sample count.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Get the dimensionality.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Reset statistics to initial state.
    pub fn reset(&mut self) {
        self.mean.fill(0.0);
        self.var_sum.fill(0.0);
        self.count = 0.0;
    }
}

/// Running statistics for scalar values (value targets, returns).
///
/// Simpler version of RunningMeanStd for single-dimensional data. Unlike
/// the observation scaler this one is also used in reverse: value network
/// outputs live in normalized space and are mapped back with
/// [`RunningScalarStats::denormalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningScalarStats {
    mean: f64,
    var_sum: f64,
    count: f64,
    epsilon: f64,
}

impl RunningScalarStats {
    /// Create new scalar statistics tracker.
    pub fn new() -> Self {
        Self {
            mean: 0.0,
            var_sum: 0.0,
            count: 0.0,
            epsilon: 1e-8,
        }
    }

    /// Update with a single value.
    pub fn update(&mut self, x: f32) {
        self.count += 1.0;
        let x = x as f64;
        let delta = x - self.mean;
        self.mean += delta / self.count;
        let delta2 = x - self.mean;
        self.var_sum += delta * delta2;
    }

    /// Update with multiple values.
    pub fn update_batch(&mut self, values: &[f32]) {
        for &x in values {
            self.update(x);
        }
    }

    /// Normalize a value.
    pub fn normalize(&self, x: f32) -> f32 {
        let std = self.std();
        ((x as f64 - self.mean) / std) as f32
    }

    /// Map a normalized value back to the original scale.
    pub fn denormalize(&self, x: f32) -> f32 {
        (x as f64 * self.std() + self.mean) as f32
    }

    /// Normalize a batch of values.
    pub fn normalize_batch(&self, values: &[f32]) -> Vec<f32> {
        values.iter().map(|&x| self.normalize(x)).collect()
    }

    /// Get the standard deviation.
    pub fn std(&self) -> f64 {
        if self.count < 2.0 {
            1.0
        } else {
            (self.var_sum / self.count).sqrt().max(self.epsilon)
        }
    }

    /// Get the mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Get the sample count.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Reset to initial state.
    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.var_sum = 0.0;
        self.count = 0.0;
    }
}

impl Default for RunningScalarStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Both preprocessors bundled for persistence.
///
/// A policy checkpoint is only usable together with the scaling that was
/// active when it was saved, so the checkpointer writes this next to every
/// module pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessorState {
    /// Observation scaler.
    pub observations: RunningMeanStd,
    /// Return scaler for the value function.
    pub returns: RunningScalarStats,
}
