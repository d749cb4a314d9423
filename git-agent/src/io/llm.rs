//! Language-model client.
//!
//! The [`ModelClient`] trait is the only seam between the agent loop and the
//! provider. [`OpenRouter`] speaks the OpenAI-compatible chat-completions API
//! with tool calling and a JSON-schema response format; tests use scripted
//! clients from `test_support` instead.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::response::ResponseFormat;
use crate::core::types::{
    AssistantMessage, Message, ModelTurn, ToolCall, ToolDescriptor, Usage,
};

/// Everything the model sees in one round-trip.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDescriptor],
    pub response_format: &'a ResponseFormat,
}

/// Failure talking to the model provider.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("missing API key (pass --api-key or set GA_API_KEY)")]
    MissingApiKey,
    #[error("model request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model provider error: {0}")]
    Provider(String),
    #[error("invalid response from model provider: {0}")]
    InvalidResponse(String),
}

/// Client boundary used by the agent loop.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the full history and tool list; return the assistant's reply.
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError>;
}

/// Connection settings for [`OpenRouter`].
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// OpenAI-compatible chat-completions client (OpenRouter by default).
#[derive(Debug, Clone)]
pub struct OpenRouter {
    config: OpenRouterConfig,
    http: Client,
}

impl OpenRouter {
    pub fn new(config: OpenRouterConfig) -> Result<Self, ModelError> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey);
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ModelClient for OpenRouter {
    #[instrument(skip_all, fields(model = %self.config.model, messages = request.messages.len()))]
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        let payload = ChatRequest::new(&self.config, request);
        info!("sending chat completion request");

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let turn = completion.into_turn()?;
        debug!(
            tool_calls = turn.message.tool_calls.len(),
            completion_tokens = turn.usage.completion_tokens,
            "received chat completion"
        );
        Ok(turn)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    response_format: WireResponseFormat<'a>,
}

impl<'a> ChatRequest<'a> {
    fn new(config: &'a OpenRouterConfig, request: ModelRequest<'a>) -> Self {
        Self {
            model: &config.model,
            max_tokens: config.max_tokens,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request.tools.iter().map(WireTool::from).collect(),
            response_format: WireResponseFormat::from(request.response_format),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage<'a> {
    System {
        content: &'a str,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<&'a str>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<WireToolCall<'a>>,
    },
    Tool {
        tool_call_id: &'a str,
        content: &'a str,
    },
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        match message {
            Message::System { content } => Self::System { content },
            Message::Assistant(assistant) => Self::Assistant {
                content: assistant.content.as_deref(),
                tool_calls: assistant.tool_calls.iter().map(WireToolCall::from).collect(),
            },
            Message::Tool(result) => Self::Tool {
                tool_call_id: &result.tool_call_id,
                content: &result.content,
            },
        }
    }
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall<'a>,
}

impl<'a> From<&'a ToolCall> for WireToolCall<'a> {
    fn from(call: &'a ToolCall) -> Self {
        Self {
            id: &call.id,
            kind: "function",
            function: WireFunctionCall {
                name: &call.name,
                arguments: &call.arguments,
            },
        }
    }
}

#[derive(Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

impl<'a> From<&'a ToolDescriptor> for WireTool<'a> {
    fn from(descriptor: &'a ToolDescriptor) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: &descriptor.name,
                description: &descriptor.description,
                parameters: &descriptor.parameters,
            },
        }
    }
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Serialize)]
struct WireResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: WireJsonSchema<'a>,
}

impl<'a> From<&'a ResponseFormat> for WireResponseFormat<'a> {
    fn from(format: &'a ResponseFormat) -> Self {
        Self {
            kind: "json_schema",
            json_schema: WireJsonSchema {
                name: format.name,
                description: format.description,
                strict: format.strict,
                schema: &format.schema,
            },
        }
    }
}

#[derive(Serialize)]
struct WireJsonSchema<'a> {
    name: &'a str,
    description: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ChatCompletion {
    fn into_turn(self) -> Result<ModelTurn, ModelError> {
        if let Some(error) = self.error {
            return Err(ModelError::Provider(error.message));
        }
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("missing choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments.unwrap_or_default(),
            })
            .collect();

        let created = self
            .created
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Ok(ModelTurn {
            message: AssistantMessage {
                content: choice.message.content,
                tool_calls,
            },
            usage: Usage {
                completion_tokens: self.usage.map(|u| u.completion_tokens).unwrap_or(0),
                created,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::response::response_format;
    use crate::core::types::ToolResult;
    use serde_json::json;

    fn config() -> OpenRouterConfig {
        OpenRouterConfig {
            api_key: "test-key".to_string(),
            api_url: "https://openrouter.ai/api/v1/".to_string(),
            model: "anthropic/claude-3.5-haiku".to_string(),
            max_tokens: 512,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn rejects_blank_api_key() {
        let err = OpenRouter::new(OpenRouterConfig {
            api_key: "  ".to_string(),
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey));
    }

    #[test]
    fn completions_url_joins_cleanly() {
        let client = OpenRouter::new(config()).expect("client");
        assert_eq!(
            client.completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn request_uses_openai_wire_format() {
        let messages = vec![
            Message::system("prompt"),
            Message::Assistant(AssistantMessage {
                content: None,
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "git_command".to_string(),
                    arguments: r#"{"args":["status"]}"#.to_string(),
                }],
            }),
            Message::Tool(ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "clean".to_string(),
            }),
        ];
        let tools = vec![ToolDescriptor {
            name: "git_command".to_string(),
            description: "run git".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let cfg = config();
        let payload = ChatRequest::new(
            &cfg,
            ModelRequest {
                messages: &messages,
                tools: &tools,
                response_format: response_format(),
            },
        );
        let value = serde_json::to_value(&payload).expect("serialize");

        assert_eq!(value["model"], "anthropic/claude-3.5-haiku");
        assert_eq!(value["max_tokens"], 512);
        assert_eq!(value["messages"][0], json!({"role": "system", "content": "prompt"}));
        assert_eq!(
            value["messages"][1],
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "git_command", "arguments": "{\"args\":[\"status\"]}"}
                }]
            })
        );
        assert_eq!(
            value["messages"][2],
            json!({"role": "tool", "tool_call_id": "call_1", "content": "clean"})
        );
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "git_command");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(
            value["response_format"]["json_schema"]["name"],
            "commit_response"
        );
    }

    #[test]
    fn completion_with_tool_calls_becomes_turn() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "created": 1_700_000_000,
            "choices": [{
                "message": {
                    "content": "Let me look at the diff.",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "git_command", "arguments": "{\"args\":[\"diff\",\"--cached\"]}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 42}
        }))
        .expect("deserialize");

        let turn = completion.into_turn().expect("turn");
        assert_eq!(turn.message.text(), "Let me look at the diff.");
        assert_eq!(turn.message.tool_calls.len(), 1);
        assert_eq!(turn.message.tool_calls[0].id, "call_9");
        assert_eq!(turn.usage.completion_tokens, 42);
        assert_eq!(turn.usage.created.timestamp(), 1_700_000_000);
    }

    #[test]
    fn null_tool_calls_and_content_are_tolerated() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [{"message": {"content": null, "tool_calls": null}}]
        }))
        .expect("deserialize");
        let turn = completion.into_turn().expect("turn");
        assert_eq!(turn.message, AssistantMessage::default());
    }

    #[test]
    fn provider_error_body_is_surfaced() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "error": {"message": "rate limited", "code": 429}
        }))
        .expect("deserialize");
        let err = completion.into_turn().unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn empty_choices_are_invalid() {
        let completion: ChatCompletion =
            serde_json::from_value(json!({"choices": []})).expect("deserialize");
        assert!(matches!(
            completion.into_turn(),
            Err(ModelError::InvalidResponse(_))
        ));
    }
}
