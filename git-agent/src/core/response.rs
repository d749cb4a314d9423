//! Decoding of the model's final message.
//!
//! The canonical shape is `{"type": "error"|"suggestion"|"result", "value": "..."}`,
//! enforced upstream through the response format and re-validated here against
//! the same JSON schema. Two older shapes are still accepted:
//! `{"error"?, "suggestion"?, "result"?}` and `{"commit_message": "..."}`.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const RESPONSE_SCHEMA: &str = include_str!("../../schemas/commit_response.schema.json");

const EXCERPT_CHARS: usize = 200;

static RESPONSE_SCHEMA_JSON: LazyLock<Value> = LazyLock::new(|| {
    serde_json::from_str(RESPONSE_SCHEMA).expect("bundled response schema must be valid json")
});

static RESPONSE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&RESPONSE_SCHEMA_JSON)
        .expect("bundled response schema must compile")
});

/// Terminal answer decoded from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    Error(String),
    Suggestion(String),
    Result(String),
}

/// The final message contained no valid response object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed response from model: no valid response object in {excerpt:?}")]
pub struct MalformedResponse {
    pub excerpt: String,
}

/// Response-format constraint sent with every model request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    pub name: &'static str,
    pub description: &'static str,
    pub strict: bool,
    pub schema: Value,
}

static RESPONSE_FORMAT: LazyLock<ResponseFormat> = LazyLock::new(|| ResponseFormat {
    name: "commit_response",
    description: "A single compact JSON object: {\"type\":\"error\"|\"suggestion\"|\"result\",\"value\":\"...\"}",
    strict: true,
    schema: RESPONSE_SCHEMA_JSON.clone(),
});

/// The response format the model is constrained to.
pub fn response_format() -> &'static ResponseFormat {
    &RESPONSE_FORMAT
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Kind,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Kind {
    Error,
    Suggestion,
    Result,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyFields {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    suggestion: Option<Value>,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyCommit {
    commit_message: String,
}

/// Decode every valid response object in `content`, in order.
///
/// The whole content is tried first; if it is not a response object, each
/// non-empty line is tried on its own and invalid lines are skipped.
pub fn parse_responses(content: &str) -> Result<Vec<AgentResponse>, MalformedResponse> {
    let trimmed = content.trim();
    let whole = parse_candidate(trimmed);
    if !whole.is_empty() {
        return Ok(whole);
    }

    let mut responses = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = parse_candidate(line);
        if parsed.is_empty() {
            debug!(line, "skipping line that is not a response object");
        }
        responses.extend(parsed);
    }

    if responses.is_empty() {
        return Err(MalformedResponse {
            excerpt: trimmed.chars().take(EXCERPT_CHARS).collect(),
        });
    }
    Ok(responses)
}

/// Decode the final message: the last valid response object wins.
pub fn parse_response(content: &str) -> Result<AgentResponse, MalformedResponse> {
    let mut responses = parse_responses(content)?;
    // parse_responses never returns an empty list
    responses.pop().ok_or_else(|| MalformedResponse {
        excerpt: String::new(),
    })
}

fn parse_candidate(text: &str) -> Vec<AgentResponse> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    if !value.is_object() {
        return Vec::new();
    }

    if RESPONSE_VALIDATOR.is_valid(&value) {
        return match serde_json::from_value::<Envelope>(value) {
            Ok(envelope) => vec![envelope.into_response()],
            Err(_) => Vec::new(),
        };
    }

    if let Ok(legacy) = serde_json::from_value::<LegacyFields>(value.clone()) {
        return legacy.into_responses();
    }

    match serde_json::from_value::<LegacyCommit>(value) {
        Ok(legacy) if !legacy.commit_message.trim().is_empty() => {
            vec![AgentResponse::Result(legacy.commit_message)]
        }
        _ => Vec::new(),
    }
}

impl Envelope {
    fn into_response(self) -> AgentResponse {
        match self.kind {
            Kind::Error => AgentResponse::Error(self.value),
            Kind::Suggestion => AgentResponse::Suggestion(self.value),
            Kind::Result => AgentResponse::Result(self.value),
        }
    }
}

impl LegacyFields {
    /// Ordered so that "last wins" gives error > result > suggestion.
    fn into_responses(self) -> Vec<AgentResponse> {
        let mut out = Vec::new();
        if let Some(suggestion) = self.suggestion {
            let text = match suggestion {
                Value::String(text) => text,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            if !text.trim().is_empty() {
                out.push(AgentResponse::Suggestion(text));
            }
        }
        if let Some(result) = self.result.filter(|r| !r.trim().is_empty()) {
            out.push(AgentResponse::Result(result));
        }
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            out.push(AgentResponse::Error(error));
        }
        out
    }
}
