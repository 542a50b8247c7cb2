//! Core data types shared across the training engine.

pub mod running_stats;
pub mod transition;
