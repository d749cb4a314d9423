//! Test-only helpers: scripted model clients, fake tools and scratch git repos.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::types::{AssistantMessage, Message, ModelTurn, ToolCall, Usage};
use crate::io::llm::{ModelClient, ModelError, ModelRequest};
use crate::tools::{Tool, ToolContext, ToolError};

/// Build a tool call with deterministic fields.
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// Intermediate turn: optional commentary plus tool calls.
pub fn tool_turn(text: &str, calls: Vec<ToolCall>) -> ModelTurn {
    ModelTurn {
        message: AssistantMessage {
            content: (!text.is_empty()).then(|| text.to_string()),
            tool_calls: calls,
        },
        usage: usage(),
    }
}

/// Final turn: content only, no tool calls.
pub fn final_turn(content: &str) -> ModelTurn {
    ModelTurn {
        message: AssistantMessage {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        },
        usage: usage(),
    }
}

fn usage() -> Usage {
    Usage {
        completion_tokens: 7,
        created: Utc::now(),
    }
}

/// Model client that replays a fixed script and records every request.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self::with_results(turns.into_iter().map(Ok).collect())
    }

    pub fn with_results(script: Vec<Result<ModelTurn, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// History snapshots, one per `send` call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.messages.to_vec());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".to_string())))
    }
}

/// Model client whose call never completes; only cancellation ends it.
#[derive(Default)]
pub struct PendingModel {
    calls: AtomicUsize,
}

impl PendingModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for PendingModel {
    async fn send(&self, _request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Tool that counts its invocations and returns a canned reply.
#[derive(Clone)]
pub struct CountingTool {
    name: &'static str,
    reply: Result<String, String>,
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<String>>>,
}

impl CountingTool {
    pub fn ok(name: &'static str, reply: &str) -> Self {
        Self {
            name,
            reply: Ok(reply.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every call with a `NotFound` error naming `path`.
    pub fn failing(name: &'static str, path: &str) -> Self {
        Self {
            reply: Err(path.to_string()),
            ..Self::ok(name, "")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().expect("inputs lock").clone()
    }
}

impl Tool for CountingTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "test tool"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn call(&self, _ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .expect("inputs lock")
            .push(input.to_string());
        self.reply.clone().map_err(ToolError::NotFound)
    }
}

/// Scratch git repository with a deterministic identity.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["config", "user.name", "Test User"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn stage(&self, rel: &str) -> Result<()> {
        self.git(&["add", "--", rel])
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "--all"])?;
        self.git(&["commit", "--quiet", "-m", message])
    }

    /// Subject lines of the commit log, newest first.
    pub fn log_subjects(&self) -> Result<Vec<String>> {
        let output = Command::new("git")
            .args(["log", "--format=%s"])
            .current_dir(self.path())
            .output()
            .context("spawn git log")?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
