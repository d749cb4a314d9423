//! The agent loop.
//!
//! One run alternates between a model round-trip and sequential tool
//! dispatch until the model answers without tool calls:
//!
//! ```text
//! AwaitingModel -> InterpretingResponse -> Terminal
//!                                       -> DispatchingTools -> AwaitingModel
//! ```
//!
//! Only model, response-format and model-reported errors end a run early;
//! tool failures are folded into the conversation so the model can adapt.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::hooks::Hooks;
use crate::core::response::{AgentResponse, MalformedResponse, parse_responses, response_format};
use crate::core::types::{Message, ModelTurn};
use crate::io::llm::{ModelClient, ModelError, ModelRequest};
use crate::tools::ToolSet;

pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Failure that ends a run. No commit message accompanies any of these.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("run cancelled")]
    Cancelled,
    #[error(transparent)]
    Response(#[from] MalformedResponse),
    /// The model answered `{"type":"error"}`; the value is shown as is.
    #[error("{0}")]
    ModelReported(String),
    #[error("model finished without a commit message")]
    NoResult,
    #[error("model did not produce an answer within {0} iterations")]
    IterationLimit(u32),
}

/// Drives a model through the tool set until it returns a commit message.
pub struct Agent {
    model: Arc<dyn ModelClient>,
    tools: ToolSet,
    hooks: Hooks,
    system_prompt: String,
    max_iterations: u32,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelClient>, tools: ToolSet, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            tools,
            hooks: Hooks::default(),
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Maximum model round-trips per run (at least one).
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Run the conversation to completion and return the commit message.
    ///
    /// Cancelling `cancel` aborts the in-flight model request and prevents
    /// any further tool dispatch.
    #[instrument(skip_all, fields(max_iterations = self.max_iterations))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<String, AgentError> {
        let mut history = vec![Message::system(self.system_prompt.clone())];

        for iteration in 1..=self.max_iterations {
            debug!(iteration, messages = history.len(), "awaiting model");
            let request = ModelRequest {
                messages: &history,
                tools: self.tools.descriptors(),
                response_format: response_format(),
            };
            let turn = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                turn = self.model.send(request) => turn?,
            };

            if turn.message.tool_calls.is_empty() {
                info!(iteration, "model returned a final answer");
                return self.finish(turn.message.text());
            }

            self.dispatch_tools(&turn, &mut history, cancel).await?;
            self.hooks.emit_after_step(&turn);
        }

        warn!(max_iterations = self.max_iterations, "iteration limit reached");
        Err(AgentError::IterationLimit(self.max_iterations))
    }

    async fn dispatch_tools(
        &self,
        turn: &ModelTurn,
        history: &mut Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        if !turn.message.text().trim().is_empty() {
            self.hooks.emit_agent_content(turn);
        }

        let mut results = Vec::with_capacity(turn.message.tool_calls.len());
        for call in &turn.message.tool_calls {
            self.hooks.emit_before_tool_call(call);
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.tools.dispatch(call) => result,
            };
            results.push(result);
        }

        history.push(Message::Assistant(turn.message.clone()));
        history.extend(results.into_iter().map(Message::Tool));
        Ok(())
    }

    /// Suggestions go to the hook; the last error or result decides the run.
    fn finish(&self, content: &str) -> Result<String, AgentError> {
        let mut outcome = None;
        for response in parse_responses(content)? {
            match response {
                AgentResponse::Suggestion(text) => self.hooks.emit_suggestion(&text),
                other => outcome = Some(other),
            }
        }

        match outcome {
            Some(AgentResponse::Result(message)) if !message.trim().is_empty() => {
                Ok(message.trim().to_string())
            }
            Some(AgentResponse::Error(message)) => Err(AgentError::ModelReported(message)),
            _ => Err(AgentError::NoResult),
        }
    }
}
