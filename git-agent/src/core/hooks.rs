//! Lifecycle notifications fired by the agent loop.
//!
//! Hooks are registered during setup and owned by the [`Agent`](crate::agent::Agent).
//! The loop only borrows them while it runs, so a callback can never register
//! another one. Callbacks fire synchronously, in registration order, on the
//! loop's own task.

use std::fmt;

use crate::core::types::{ModelTurn, ToolCall};

type TurnHook = Box<dyn Fn(&ModelTurn) + Send + Sync>;
type ToolCallHook = Box<dyn Fn(&ToolCall) + Send + Sync>;
type SuggestionHook = Box<dyn Fn(&str) + Send + Sync>;

/// Ordered callback lists keyed by lifecycle event.
#[derive(Default)]
pub struct Hooks {
    agent_content: Vec<TurnHook>,
    after_step: Vec<TurnHook>,
    before_tool_call: Vec<ToolCallHook>,
    suggestion: Vec<SuggestionHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// An intermediate step carried commentary alongside its tool calls.
    pub fn on_agent_content(&mut self, hook: impl Fn(&ModelTurn) + Send + Sync + 'static) {
        self.agent_content.push(Box::new(hook));
    }

    /// Every tool call of an intermediate step has been answered.
    pub fn on_after_step(&mut self, hook: impl Fn(&ModelTurn) + Send + Sync + 'static) {
        self.after_step.push(Box::new(hook));
    }

    /// A tool is about to be dispatched.
    pub fn on_before_tool_call(&mut self, hook: impl Fn(&ToolCall) + Send + Sync + 'static) {
        self.before_tool_call.push(Box::new(hook));
    }

    /// The final message carried a suggestion for the operator.
    pub fn on_suggestion(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.suggestion.push(Box::new(hook));
    }

    pub(crate) fn emit_agent_content(&self, turn: &ModelTurn) {
        for hook in &self.agent_content {
            hook(turn);
        }
    }

    pub(crate) fn emit_after_step(&self, turn: &ModelTurn) {
        for hook in &self.after_step {
            hook(turn);
        }
    }

    pub(crate) fn emit_before_tool_call(&self, call: &ToolCall) {
        for hook in &self.before_tool_call {
            hook(call);
        }
    }

    pub(crate) fn emit_suggestion(&self, suggestion: &str) {
        for hook in &self.suggestion {
            hook(suggestion);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("agent_content", &self.agent_content.len())
            .field("after_step", &self.after_step.len())
            .field("before_tool_call", &self.before_tool_call.len())
            .field("suggestion", &self.suggestion.len())
            .finish()
    }
}
