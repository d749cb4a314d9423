//! Side-effecting operations: git, child processes, configuration, prompt
//! templates and the model API.

pub mod config;
pub mod git;
pub mod llm;
pub mod process;
pub mod prompt;
