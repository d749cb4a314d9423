//! Commit-message agent for git working trees.
//!
//! A language model inspects the staged changes through a small set of
//! read-only tools and answers with a commit message. The crate keeps the
//! same split as the binary's data flow:
//!
//! - **[`core`]**: Pure logic (path guard, response parsing, hooks, message
//!   types). No I/O.
//! - **[`io`]**: Side effects (git, child processes, configuration, prompt
//!   rendering, the model API).
//! - **[`tools`]**: The sandboxed tool set exposed to the model.
//! - **[`agent`]**: The loop that ties the model and the tools together.

pub mod agent;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
