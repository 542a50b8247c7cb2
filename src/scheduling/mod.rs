//! Adaptive rate scheduling for the value-function optimizer.

pub mod kl_adaptive;

pub use kl_adaptive::KlAdaptiveLr;
