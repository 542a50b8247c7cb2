//! Checkpointing for the policy / value-function pair.
//!
//! Saves both modules plus the preprocessor state at environment-step
//! intervals, tracks the best checkpoint by mean episode reward, and keeps
//! only the most recent N on disk. The preprocessor state rides along
//! because a restored policy expects the input scaling it was trained
//! under.

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::core::running_stats::PreprocessorState;

/// Configuration for the checkpointer.
#[derive(Debug, Clone)]
pub struct CheckpointerConfig {
    /// Directory to store checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Environment steps between checkpoint saves.
    pub save_interval: usize,
    /// Number of recent checkpoint pairs to keep (0 = keep all).
    pub keep_last_n: usize,
    /// Whether to track and save the best pair.
    pub save_best: bool,
}

impl Default for CheckpointerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            save_interval: 1000,
            keep_last_n: 5,
            save_best: true,
        }
    }
}

impl CheckpointerConfig {
    /// Create a new config with the specified checkpoint directory.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    /// Set the save interval in environment steps.
    pub fn with_save_interval(mut self, interval: usize) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set the number of checkpoint pairs to keep.
    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }

    /// Enable or disable best pair tracking.
    pub fn with_save_best(mut self, save_best: bool) -> Self {
        self.save_best = save_best;
        self
    }
}

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// Preprocessor state (de)serialization error.
    Stats(String),
    /// No checkpoints found.
    NoCheckpoints,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Stats(e) => write!(f, "Preprocessor state error: {}", e),
            CheckpointError::NoCheckpoints => write!(f, "No checkpoints found"),
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Checkpoint metadata.
#[derive(Debug, Clone)]
pub struct CheckpointInfo {
    /// Path to the saved policy module.
    pub policy_path: PathBuf,
    /// Path to the saved value module.
    pub value_path: PathBuf,
    /// Path to the saved preprocessor state.
    pub stats_path: PathBuf,
    /// Environment step at which the pair was saved.
    pub step: usize,
    /// Optional metric value (mean episode reward).
    pub metric: Option<f32>,
}

/// Policy / value checkpointer.
pub struct Checkpointer {
    config: CheckpointerConfig,
    best_metric: f32,
    last_save_step: usize,
    checkpoint_history: Vec<CheckpointInfo>,
}

impl Checkpointer {
    /// Create a new checkpointer.
    ///
    /// Creates the checkpoint directory if it doesn't exist.
    pub fn new(config: CheckpointerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.checkpoint_dir)?;

        Ok(Self {
            config,
            best_metric: f32::NEG_INFINITY,
            last_save_step: 0,
            checkpoint_history: Vec::new(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    /// Whether a save interval has elapsed since the last save.
    ///
    /// Environment steps advance by the number of parallel environments per
    /// tick, so exact interval multiples are never assumed.
    pub fn should_save(&self, step: usize) -> bool {
        step >= self.last_save_step + self.config.save_interval
    }

    /// Save a policy / value pair with its preprocessor state.
    ///
    /// # Arguments
    ///
    /// * `policy` - The policy module to save
    /// * `value` - The value module to save
    /// * `stats` - Preprocessor state active at save time
    /// * `step` - Current environment step
    /// * `metric` - Optional metric value (mean episode reward)
    pub fn save_pair<B: Backend, P: Module<B>, V: Module<B>>(
        &mut self,
        policy: &P,
        value: &V,
        stats: &PreprocessorState,
        step: usize,
        metric: Option<f32>,
    ) -> Result<CheckpointInfo, CheckpointError> {
        let policy_path = self
            .config
            .checkpoint_dir
            .join(format!("policy_{:08}.bin", step));
        let value_path = self
            .config
            .checkpoint_dir
            .join(format!("value_{:08}.bin", step));
        let stats_path = self
            .config
            .checkpoint_dir
            .join(format!("stats_{:08}.json", step));

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        policy
            .clone()
            .save_file(&policy_path, &recorder)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        value
            .clone()
            .save_file(&value_path, &recorder)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        Self::write_stats(&stats_path, stats)?;

        let info = CheckpointInfo {
            policy_path,
            value_path,
            stats_path,
            step,
            metric,
        };
        self.checkpoint_history.push(info.clone());
        self.last_save_step = step;

        if self.config.save_best {
            if let Some(m) = metric {
                if m > self.best_metric {
                    self.best_metric = m;
                    policy
                        .clone()
                        .save_file(
                            self.config.checkpoint_dir.join("policy_best.bin"),
                            &recorder,
                        )
                        .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
                    value
                        .clone()
                        .save_file(
                            self.config.checkpoint_dir.join("value_best.bin"),
                            &recorder,
                        )
                        .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
                    Self::write_stats(
                        &self.config.checkpoint_dir.join("stats_best.json"),
                        stats,
                    )?;
                }
            }
        }

        self.cleanup_old_checkpoints();

        Ok(info)
    }

    fn write_stats(path: &Path, stats: &PreprocessorState) -> Result<(), CheckpointError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), stats)
            .map_err(|e| CheckpointError::Stats(e.to_string()))
    }

    /// Load preprocessor state from a checkpoint file.
    pub fn load_stats(&self, path: &Path) -> Result<PreprocessorState, CheckpointError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CheckpointError::Stats(e.to_string()))
    }

    /// Load a module from a checkpoint file into a template of the same
    /// architecture.
    pub fn load<B: Backend, M: Module<B>>(
        &self,
        template: M,
        path: &Path,
        device: &B::Device,
    ) -> Result<M, CheckpointError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        template
            .load_file(path, &recorder, device)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))
    }

    /// Load the best policy / value pair and its preprocessor state.
    pub fn load_best<B: Backend, P: Module<B>, V: Module<B>>(
        &self,
        policy_template: P,
        value_template: V,
        device: &B::Device,
    ) -> Result<(P, V, PreprocessorState), CheckpointError> {
        let policy_path = self.config.checkpoint_dir.join("policy_best.bin");
        let value_path = self.config.checkpoint_dir.join("value_best.bin");
        let stats_path = self.config.checkpoint_dir.join("stats_best.json");
        if !policy_path.exists() || !value_path.exists() {
            return Err(CheckpointError::NoCheckpoints);
        }

        let policy = self.load(policy_template, &policy_path, device)?;
        let value = self.load(value_template, &value_path, device)?;
        let stats = self.load_stats(&stats_path)?;
        Ok((policy, value, stats))
    }

    /// Load the latest checkpoint and the step it was saved at.
    pub fn load_latest<B: Backend, P: Module<B>, V: Module<B>>(
        &self,
        policy_template: P,
        value_template: V,
        device: &B::Device,
    ) -> Result<(P, V, PreprocessorState, usize), CheckpointError> {
        let latest = self
            .list_checkpoints()?
            .pop()
            .ok_or(CheckpointError::NoCheckpoints)?;

        let policy = self.load(policy_template, &latest.policy_path, device)?;
        let value = self.load(value_template, &latest.value_path, device)?;
        let stats = self.load_stats(&latest.stats_path)?;
        Ok((policy, value, stats, latest.step))
    }

    /// List all checkpoint pairs in the directory, sorted by step.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let mut checkpoints: Vec<CheckpointInfo> = fs::read_dir(&self.config.checkpoint_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let filename = path.file_name()?.to_str()?;
                let step: usize = filename
                    .strip_prefix("policy_")?
                    .strip_suffix(".bin")?
                    .parse()
                    .ok()?;

                let value_path = self
                    .config
                    .checkpoint_dir
                    .join(format!("value_{:08}.bin", step));
                if !value_path.exists() {
                    return None;
                }
                let stats_path = self
                    .config
                    .checkpoint_dir
                    .join(format!("stats_{:08}.json", step));

                Some(CheckpointInfo {
                    policy_path: path,
                    value_path,
                    stats_path,
                    step,
                    metric: None,
                })
            })
            .collect();

        checkpoints.sort_by_key(|c| c.step);
        Ok(checkpoints)
    }

    /// Get the current best metric value.
    pub fn best_metric(&self) -> f32 {
        self.best_metric
    }

    /// Cleanup old checkpoint pairs, keeping only the last N.
    fn cleanup_old_checkpoints(&mut self) {
        if self.config.keep_last_n == 0 {
            return;
        }

        while self.checkpoint_history.len() > self.config.keep_last_n {
            let old = self.checkpoint_history.remove(0);
            let _ = fs::remove_file(&old.policy_path);
            let _ = fs::remove_file(&old.value_path);
            let _ = fs::remove_file(&old.stats_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::running_stats::{RunningMeanStd, RunningScalarStats};
    use crate::nn::{StochasticPolicyConfig, ValueFunctionConfig};
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn fresh_stats(dim: usize) -> PreprocessorState {
        PreprocessorState {
            observations: RunningMeanStd::new(dim),
            returns: RunningScalarStats::new(),
        }
    }

    #[test]
    fn test_checkpointer_config() {
        let config = CheckpointerConfig::new("./test_ckpts")
            .with_save_interval(5000)
            .with_keep_last_n(3)
            .with_save_best(false);

        assert_eq!(config.checkpoint_dir, PathBuf::from("./test_ckpts"));
        assert_eq!(config.save_interval, 5000);
        assert_eq!(config.keep_last_n, 3);
        assert!(!config.save_best);
    }

    #[test]
    fn test_should_save_crossing_semantics() {
        let dir = tempdir().unwrap();
        let config = CheckpointerConfig::new(dir.path()).with_save_interval(100);
        let checkpointer = Checkpointer::new(config).unwrap();

        assert!(!checkpointer.should_save(0));
        assert!(!checkpointer.should_save(96));
        // Steps advance by num_envs; 104 crosses the interval even though
        // 100 was never hit exactly.
        assert!(checkpointer.should_save(104));
    }

    #[test]
    fn test_checkpoint_dir_creation() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("nested/checkpoints");

        let config = CheckpointerConfig::new(&subdir);
        let _checkpointer = Checkpointer::new(config).unwrap();

        assert!(subdir.exists());
    }

    #[test]
    fn test_save_and_load_pair() {
        let dir = tempdir().unwrap();
        let device = Default::default();

        let policy = StochasticPolicyConfig::new(3, 2, vec![4]).init::<TestBackend>(&device);
        let value = ValueFunctionConfig::new(3, vec![4]).init::<TestBackend>(&device);

        let mut checkpointer =
            Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        let info = checkpointer
            .save_pair(&policy, &value, &fresh_stats(3), 1000, Some(12.5))
            .unwrap();

        assert!(info.policy_path.exists());
        assert!(info.value_path.exists());
        assert!(info.stats_path.exists());

        let policy_template =
            StochasticPolicyConfig::new(3, 2, vec![4]).init::<TestBackend>(&device);
        let value_template = ValueFunctionConfig::new(3, vec![4]).init::<TestBackend>(&device);
        let (_, _, _, step) = checkpointer
            .load_latest(policy_template, value_template, &device)
            .unwrap();
        assert_eq!(step, 1000);
    }

    #[test]
    fn test_preprocessor_state_survives_save_and_load() {
        let dir = tempdir().unwrap();
        let device = Default::default();

        let policy = StochasticPolicyConfig::new(2, 1, vec![4]).init::<TestBackend>(&device);
        let value = ValueFunctionConfig::new(2, vec![4]).init::<TestBackend>(&device);

        let mut stats = fresh_stats(2);
        stats.observations.update_batch(&[1.0, 10.0, 3.0, 30.0, 5.0, 50.0]);
        stats.returns.update_batch(&[-2.0, 0.0, 2.0, 4.0]);

        let mut checkpointer =
            Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        checkpointer
            .save_pair(&policy, &value, &stats, 500, Some(3.0))
            .unwrap();

        let policy_template =
            StochasticPolicyConfig::new(2, 1, vec![4]).init::<TestBackend>(&device);
        let value_template = ValueFunctionConfig::new(2, vec![4]).init::<TestBackend>(&device);
        let (_, _, restored, _) = checkpointer
            .load_latest(policy_template, value_template, &device)
            .unwrap();

        // A restored policy must see the same input scaling it was trained
        // under, and the value head the same return scaling.
        assert_eq!(restored.observations.count(), stats.observations.count());
        assert_eq!(
            restored.observations.normalize(&[2.0, 20.0]),
            stats.observations.normalize(&[2.0, 20.0])
        );
        assert_eq!(restored.returns.denormalize(0.5), stats.returns.denormalize(0.5));

        // Best checkpoint carries its own copy
        let bp = StochasticPolicyConfig::new(2, 1, vec![4]).init::<TestBackend>(&device);
        let bv = ValueFunctionConfig::new(2, vec![4]).init::<TestBackend>(&device);
        let (_, _, best_stats) = checkpointer.load_best(bp, bv, &device).unwrap();
        assert_eq!(best_stats.observations.count(), stats.observations.count());
    }

    #[test]
    fn test_best_pair_tracking() {
        let dir = tempdir().unwrap();
        let device = Default::default();

        let policy = StochasticPolicyConfig::new(2, 1, vec![4]).init::<TestBackend>(&device);
        let value = ValueFunctionConfig::new(2, vec![4]).init::<TestBackend>(&device);

        let mut checkpointer =
            Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();

        let stats = fresh_stats(2);
        checkpointer.save_pair(&policy, &value, &stats, 100, Some(1.0)).unwrap();
        assert_eq!(checkpointer.best_metric(), 1.0);

        checkpointer.save_pair(&policy, &value, &stats, 200, Some(5.0)).unwrap();
        assert_eq!(checkpointer.best_metric(), 5.0);

        // Lower metric does not overwrite best
        checkpointer.save_pair(&policy, &value, &stats, 300, Some(2.0)).unwrap();
        assert_eq!(checkpointer.best_metric(), 5.0);

        assert!(dir.path().join("policy_best.bin").exists());
        assert!(dir.path().join("value_best.bin").exists());
        assert!(dir.path().join("stats_best.json").exists());
    }

    #[test]
    fn test_keep_last_n_cleanup() {
        let dir = tempdir().unwrap();
        let device = Default::default();

        let policy = StochasticPolicyConfig::new(2, 1, vec![4]).init::<TestBackend>(&device);
        let value = ValueFunctionConfig::new(2, vec![4]).init::<TestBackend>(&device);

        let config = CheckpointerConfig::new(dir.path())
            .with_keep_last_n(2)
            .with_save_best(false);
        let mut checkpointer = Checkpointer::new(config).unwrap();

        let stats = fresh_stats(2);
        for step in [100, 200, 300, 400] {
            checkpointer.save_pair(&policy, &value, &stats, step, None).unwrap();
        }

        let remaining = checkpointer.list_checkpoints().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].step, 300);
        assert_eq!(remaining[1].step, 400);
        assert!(!dir.path().join("stats_00000100.json").exists());
        assert!(remaining[1].stats_path.exists());
    }
}
