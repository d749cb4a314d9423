//! Conversation types shared between the agent loop, the tools and the model
//! client.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Model-issued request to call a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Opaque correlation id chosen by the model.
    pub id: String,
    pub name: String,
    /// Raw JSON argument payload, exactly as the model produced it.
    pub arguments: String,
}

/// Output of one tool call, correlated to the request by `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
}

/// Static description of a tool advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: Value,
}

/// Assistant message: optional commentary plus zero or more tool calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantMessage {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    /// Text content, or `""` when the model sent none.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    System { content: String },
    Assistant(AssistantMessage),
    Tool(ToolResult),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Assistant(_) => "assistant",
            Self::Tool(_) => "tool",
        }
    }
}

/// Usage reported alongside a model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub completion_tokens: u64,
    /// When the provider created the response.
    pub created: DateTime<Utc>,
}

impl Usage {
    /// Whole seconds between `created` and `now`, clamped at zero.
    pub fn seconds_since(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created).num_seconds().max(0)
    }
}

/// Raw result of one round-trip to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTurn {
    pub message: AssistantMessage,
    pub usage: Usage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn text_defaults_to_empty() {
        let message = AssistantMessage::default();
        assert_eq!(message.text(), "");
    }

    #[test]
    fn seconds_since_never_negative() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap();
        let usage = Usage {
            completion_tokens: 12,
            created,
        };
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 15).unwrap();
        assert_eq!(usage.seconds_since(earlier), 0);
        assert_eq!(usage.seconds_since(later), 5);
    }

    #[test]
    fn roles_match_wire_names() {
        assert_eq!(Message::system("x").role(), "system");
        assert_eq!(
            Message::Assistant(AssistantMessage::default()).role(),
            "assistant"
        );
        assert_eq!(
            Message::Tool(ToolResult {
                tool_call_id: "1".to_string(),
                content: String::new(),
            })
            .role(),
            "tool"
        );
    }
}
