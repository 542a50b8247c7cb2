//! Training metrics and logging backends.

pub mod logger;

pub use logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
