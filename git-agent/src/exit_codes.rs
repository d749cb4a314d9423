//! Stable exit codes for the `ga` CLI.

/// Commit created, or the operator declined it.
pub const OK: i32 = 0;
/// Invalid configuration, model or git failure, or a model-reported error.
pub const FAILURE: i32 = 1;
/// Interrupted by SIGINT/SIGTERM; nothing was committed.
pub const INTERRUPTED: i32 = 130;
