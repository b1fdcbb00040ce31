//! Stable exit codes for the `codeagent` binary.
//!
//! Any other non-zero code is passed through from the agent process.

/// Agent completed and produced a message.
pub const OK: i32 = 0;
/// Invalid invocation, setup failure, or an agent run without output.
pub const INVALID: i32 = 1;
/// The agent process exceeded its timeout and was killed.
pub const TIMEOUT: i32 = 124;
/// The backend executable was not found on `PATH`.
pub const NOT_FOUND: i32 = 127;
