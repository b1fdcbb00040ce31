//! Pure, deterministic logic for the agent wrapper.
//!
//! Nothing in here touches the filesystem, the environment or child processes.

pub mod input_mode;
pub mod summary;
pub mod task_id;
pub mod types;
