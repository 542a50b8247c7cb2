//! Persistence for trained policy and value modules.

pub mod checkpointer;

pub use checkpointer::{CheckpointError, CheckpointInfo, Checkpointer, CheckpointerConfig};
