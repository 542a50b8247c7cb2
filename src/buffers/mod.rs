//! Storage for collected experience.

pub mod rollout_buffer;
