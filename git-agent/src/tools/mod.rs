//! Read-only tools the model may call.
//!
//! Every tool is rooted at [`ToolContext::workdir`]. Filesystem tools pass
//! model-supplied paths through
//! [`clean_path`](crate::core::path::clean_path) first; the git tool only
//! runs allowlisted, non-mutating subcommands. Tool failures are never fatal:
//! the dispatcher folds them into the conversation as plain text.

mod git;
mod glob;
mod grep;
mod list;
mod read;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::path::PathError;
use crate::core::types::{ToolCall, ToolDescriptor, ToolResult};

pub use git::{GitCommand, GitOutput, READ_ONLY_SUBCOMMANDS, check_read_only};
pub use self::glob::GlobFiles;
pub use grep::Grep;
pub use list::ListFiles;
pub use read::ReadFile;

/// A capability exposed to the model.
///
/// `call` is synchronous; the dispatcher runs it on the blocking pool.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the argument object.
    fn parameters(&self) -> Value;
    fn call(&self, ctx: &ToolContext, input: &str) -> Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Environment shared by every tool call in a run.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workdir: PathBuf,
    pub command_timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ToolContext {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            command_timeout: Duration::from_secs(30),
            output_limit_bytes: 100_000,
        }
    }

    /// Absolute location of an already-cleaned relative path.
    pub fn resolve(&self, cleaned: &Path) -> PathBuf {
        self.workdir.join(cleaned)
    }
}

/// Recoverable tool failure; its display text is what the model sees.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    PathTraversal(#[from] PathError),
    #[error("failed to unmarshal input: {0}")]
    InvalidArguments(#[source] serde_json::Error),
    #[error("failed to marshal output: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("path {0} doesn't exist")]
    NotFound(String),
    #[error("nothing found for pattern '{0}'")]
    NoMatches(String),
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: ::glob::PatternError,
    },
    #[error("failed to compile regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("git command rejected: {0}")]
    DisallowedCommand(String),
    #[error("git command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to {action}: {source}")]
    Io {
        action: String,
        source: std::io::Error,
    },
    #[error("failed to walk through files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to exec git command: {0:#}")]
    Exec(anyhow::Error),
}

/// Immutable name → tool mapping, built once at startup.
pub struct ToolSet {
    context: ToolContext,
    tools: HashMap<String, Arc<dyn Tool>>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolSet {
    /// Tool names must be unique.
    pub fn new(context: ToolContext, tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(tools.len());
        let mut descriptors = Vec::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name();
            if by_name.contains_key(name) {
                bail!("duplicate tool name: {name}");
            }
            descriptors.push(tool.descriptor());
            by_name.insert(name.to_string(), tool);
        }
        Ok(Self {
            context,
            tools: by_name,
            descriptors,
        })
    }

    /// The five read-only tools: read_file, list_files, glob, grep, git_command.
    pub fn standard(context: ToolContext) -> Result<Self> {
        Self::new(
            context,
            vec![
                Arc::new(ReadFile),
                Arc::new(ListFiles),
                Arc::new(GlobFiles),
                Arc::new(Grep),
                Arc::new(GitCommand),
            ],
        )
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Run one tool call and always produce a result with the same id.
    ///
    /// Unknown tools and tool errors become result text.
    #[instrument(skip_all, fields(tool = %call.name, id = %call.id))]
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let content = match self.tools.get(&call.name) {
            None => {
                warn!("model requested an unknown tool");
                format!("Unknown tool: {}", call.name)
            }
            Some(tool) => {
                let tool = Arc::clone(tool);
                let ctx = self.context.clone();
                let input = call.arguments.clone();
                match tokio::task::spawn_blocking(move || tool.call(&ctx, &input)).await {
                    Ok(Ok(output)) => {
                        debug!(bytes = output.len(), "tool succeeded");
                        output
                    }
                    Ok(Err(err)) => {
                        debug!(err = %err, "tool failed");
                        err.to_string()
                    }
                    Err(err) => {
                        warn!(err = %err, "tool task failed");
                        format!("tool {} failed: {err}", call.name)
                    }
                }
            }
        };
        ToolResult {
            tool_call_id: call.id.clone(),
            content: truncate_output(content, self.context.output_limit_bytes),
        }
    }
}

/// Cut `text` to at most `limit` bytes on a char boundary, noting the loss.
pub fn truncate_output(text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let dropped = text.len() - cut;
    format!("{}\n[truncated {dropped} bytes]", &text[..cut])
}

fn parse_args<T: DeserializeOwned>(input: &str) -> Result<T, ToolError> {
    serde_json::from_str(input).map_err(ToolError::InvalidArguments)
}

/// `path` relative to `root`, with `/` separators; `.` for the root itself.
fn display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let text = rel.to_string_lossy().replace('\\', "/");
    if text.is_empty() { ".".to_string() } else { text }
}

fn is_git_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn io_error(action: impl Into<String>, source: std::io::Error) -> ToolError {
    ToolError::Io {
        action: action.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "echo the input"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        fn call(&self, _ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
            if input == "fail" {
                return Err(ToolError::NotFound("nowhere".to_string()));
            }
            Ok(input.to_string())
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn echo_set(limit: usize) -> ToolSet {
        let mut ctx = ToolContext::new(".");
        ctx.output_limit_bytes = limit;
        ToolSet::new(ctx, vec![Arc::new(Echo)]).expect("tool set")
    }

    #[test]
    fn standard_set_has_unique_known_names() {
        let set = ToolSet::standard(ToolContext::new(".")).expect("tool set");
        let names: Vec<&str> = set.descriptors().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["read_file", "list_files", "glob", "grep", "git_command"]
        );
        for descriptor in set.descriptors() {
            assert_eq!(descriptor.parameters["type"], "object");
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolSet::new(ToolContext::new("."), vec![Arc::new(Echo), Arc::new(Echo)])
            .err()
            .expect("error");
        assert!(err.to_string().contains("duplicate tool name: echo"));
    }

    #[tokio::test]
    async fn unknown_tool_yields_text_result() {
        let set = echo_set(1000);
        let result = set.dispatch(&call("rm_rf", "{}")).await;
        assert_eq!(result.tool_call_id, "call_1");
        assert_eq!(result.content, "Unknown tool: rm_rf");
    }

    #[tokio::test]
    async fn tool_error_becomes_result_text() {
        let set = echo_set(1000);
        let result = set.dispatch(&call("echo", "fail")).await;
        assert_eq!(result.content, "path nowhere doesn't exist");
    }

    #[tokio::test]
    async fn long_output_is_truncated() {
        let set = echo_set(4);
        let result = set.dispatch(&call("echo", "abcdefgh")).await;
        assert_eq!(result.content, "abcd\n[truncated 4 bytes]");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo".to_string();
        // 'é' spans bytes 1..3; a limit of 2 must back off to 1.
        assert_eq!(truncate_output(text, 2), "h\n[truncated 5 bytes]");
        assert_eq!(truncate_output("short".to_string(), 10), "short");
    }

    #[test]
    fn invalid_arguments_mention_unmarshal() {
        let err = parse_args::<Vec<String>>("not json").unwrap_err();
        assert!(err.to_string().starts_with("failed to unmarshal input"));
    }

    #[test]
    fn display_path_is_root_relative() {
        let root = Path::new("/repo");
        assert_eq!(display_path(root, Path::new("/repo/src/lib.rs")), "src/lib.rs");
        assert_eq!(display_path(root, Path::new("/repo")), ".");
    }
}
