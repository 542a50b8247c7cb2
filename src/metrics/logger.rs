//! Training loggers.
//!
//! The trainer emits snapshots at its configured log interval; loggers
//! format whatever they receive.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Metrics of one completed update cycle.
#[derive(Debug, Clone)]
pub struct TrainingSnapshot {
    /// Update cycle index.
    pub iteration: usize,
    /// Total environment steps collected so far.
    pub env_steps: usize,
    /// Number of completed episodes.
    pub episodes: usize,
    /// Mean reward over recently completed episodes.
    pub mean_reward: f32,
    /// Realized policy KL of this cycle.
    pub kl: f64,
    /// Surrogate objective gain of the accepted step.
    pub surrogate_improvement: f64,
    /// Value function loss after the refit.
    pub value_loss: f32,
    /// Value optimizer learning rate for the next cycle.
    pub value_lr: f64,
    /// Line search trials consumed this cycle.
    pub backtracks: usize,
}

impl TrainingSnapshot {
    /// Create a snapshot with update metrics zeroed.
    pub fn new(iteration: usize, env_steps: usize, episodes: usize, mean_reward: f32) -> Self {
        Self {
            iteration,
            env_steps,
            episodes,
            mean_reward,
            kl: 0.0,
            surrogate_improvement: 0.0,
            value_loss: 0.0,
            value_lr: 0.0,
            backtracks: 0,
        }
    }

    /// Set the trust-region step metrics.
    pub fn with_step_metrics(mut self, kl: f64, surrogate_improvement: f64, backtracks: usize) -> Self {
        self.kl = kl;
        self.surrogate_improvement = surrogate_improvement;
        self.backtracks = backtracks;
        self
    }

    /// Set the value refit metrics.
    pub fn with_value_metrics(mut self, value_loss: f32, value_lr: f64) -> Self {
        self.value_loss = value_loss;
        self.value_lr = value_lr;
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    /// Log a training snapshot.
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger with tabular formatting.
pub struct ConsoleLogger {
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a new console logger.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            show_header: true,
        }
    }

    /// Reset the start time.
    pub fn reset_timer(&mut self) {
        self.start_time = Instant::now();
    }

    fn print_header(&self) {
        println!(
            "{:>6} {:>10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>6} {:>8}",
            "Iter", "EnvSteps", "Episodes", "Reward", "KL", "Surrogate", "ValueLoss", "Backs", "FPS"
        );
        println!("{}", "-".repeat(88));
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let elapsed = self.start_time.elapsed().as_secs_f32();
        let fps = if elapsed > 0.0 {
            snapshot.env_steps as f32 / elapsed
        } else {
            0.0
        };

        println!(
            "{:>6} {:>10} {:>8} {:>10.2} {:>10.5} {:>10.5} {:>10.4} {:>6} {:>8.0}",
            snapshot.iteration,
            snapshot.env_steps,
            snapshot.episodes,
            snapshot.mean_reward,
            snapshot.kl,
            snapshot.surrogate_improvement,
            snapshot.value_loss,
            snapshot.backtracks,
            fps
        );
    }

    fn flush(&mut self) {
        // stdout is line-buffered, nothing to do
    }
}

/// CSV file logger for analysis.
pub struct CsvLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CsvLogger {
    /// Create a new CSV logger.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "iteration,env_steps,episodes,mean_reward,kl,surrogate_improvement,value_loss,value_lr,backtracks,elapsed_secs"
        )?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }

    /// Reset the start time.
    pub fn reset_timer(&mut self) {
        self.start_time = Instant::now();
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let elapsed = self.start_time.elapsed().as_secs_f32();

        let _ = writeln!(
            self.writer,
            "{},{},{},{:.4},{:.6},{:.6},{:.6},{:.8},{},{:.2}",
            snapshot.iteration,
            snapshot.env_steps,
            snapshot.episodes,
            snapshot.mean_reward,
            snapshot.kl,
            snapshot.surrogate_improvement,
            snapshot.value_loss,
            snapshot.value_lr,
            snapshot.backtracks,
            elapsed
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Multi-logger that writes to multiple backends.
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    /// Create a new multi-logger.
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    /// Add a logger.
    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
