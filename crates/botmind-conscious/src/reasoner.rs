//! [`ReasonerClient`] – OpenAI-compatible reasoning-service interface.
//!
//! Talks to any server exposing a `/v1/chat/completions` endpoint (Ollama,
//! vLLM, OpenAI itself).  The `response_format` field carries the JSON
//! Schema of [`Decision`], so a conforming server returns structured output
//! that parses directly.
//!
//! Errors are classified for the retry policy: a 429 or 5xx is worth
//! retrying, a 401 is not.

use async_trait::async_trait;
use botmind_types::ActionBody;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ReasonerConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Prompt and decision shapes
// ─────────────────────────────────────────────────────────────────────────────

/// A fully rendered prompt, kept verbatim for in-place retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// One action the reasoner proposes.  Ids are assigned later by the
/// controller's monotonic counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProposedAction {
    pub body: ActionBody,
    /// `true` when the turn should wait for this action's feedback.
    #[serde(default)]
    pub require_feedback: bool,
}

/// The structured output of one reasoning turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Decision {
    /// Free-form reasoning trace, logged but never executed.
    pub thought: String,
    pub goal: Option<String>,
    pub task: Option<String>,
    pub strategy: Option<String>,
    #[serde(default)]
    pub actions: Vec<ProposedAction>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error classification
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from one reasoning call, carrying enough shape for retry policy.
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("reasoner returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("reasoner network error: {0}")]
    Network(String),

    #[error("reasoner response unusable: {0}")]
    BadResponse(String),
}

impl DecisionError {
    /// Fatal errors are never retried: bad credentials or a malformed
    /// request will fail identically every time.
    pub fn is_fatal(&self) -> bool {
        match self {
            DecisionError::Http { status, message } => {
                matches!(status, 401 | 403)
                    || contains_any(message, &["credential", "api key", "invalid argument"])
            }
            _ => false,
        }
    }

    /// Transient errors are worth a bounded in-place retry.
    pub fn is_transient(&self) -> bool {
        if self.is_fatal() {
            return false;
        }
        match self {
            DecisionError::Http { status, message } => {
                matches!(status, 429 | 500..=599)
                    || contains_any(message, &["timeout", "rate limit", "overload"])
            }
            DecisionError::Network(message) => {
                contains_any(message, &["timeout", "connect", "reset"])
            }
            DecisionError::BadResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for DecisionError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return DecisionError::Http {
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        let kind = if error.is_timeout() {
            "timeout"
        } else if error.is_connect() {
            "connect"
        } else {
            "request"
        };
        DecisionError::Network(format!("{kind}: {error}"))
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

// ─────────────────────────────────────────────────────────────────────────────
// Reasoner trait
// ─────────────────────────────────────────────────────────────────────────────

/// The deciding seam.  Production uses [`ReasonerClient`]; tests script it.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn decide(&self, prompt: &Prompt) -> Result<Decision, DecisionError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: serde_json::Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

// ─────────────────────────────────────────────────────────────────────────────
// ReasonerClient
// ─────────────────────────────────────────────────────────────────────────────

/// Async HTTP client for the reasoning service.  Construct once and reuse
/// across decision cycles.
pub struct ReasonerClient {
    config: ReasonerConfig,
    client: reqwest::Client,
}

impl ReasonerClient {
    pub fn new(config: ReasonerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn request_body<'a>(&'a self, prompt: &Prompt) -> ChatRequest<'a> {
        let schema = serde_json::to_value(schema_for!(Decision)).unwrap_or(serde_json::Value::Null);
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.user.clone(),
                },
            ],
            stream: false,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: schema,
            },
        }
    }
}

#[async_trait]
impl Reasoner for ReasonerClient {
    /// Send `prompt` and parse the structured reply.
    ///
    /// # Errors
    ///
    /// [`DecisionError::Http`] carries the status for retry classification;
    /// [`DecisionError::BadResponse`] means the reply was not a valid
    /// [`Decision`] and is not retried.
    async fn decide(&self, prompt: &Prompt) -> Result<Decision, DecisionError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = self.request_body(prompt);

        let mut request = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DecisionError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DecisionError::BadResponse(format!("malformed envelope: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DecisionError::BadResponse("empty choices array".into()))?;

        serde_json::from_str(&content)
            .map_err(|e| DecisionError::BadResponse(format!("decision parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, message: &str) -> DecisionError {
        DecisionError::Http {
            status,
            message: message.into(),
        }
    }

    #[test]
    fn auth_failures_are_fatal_not_transient() {
        assert!(http(401, "unauthorized").is_fatal());
        assert!(http(403, "forbidden").is_fatal());
        assert!(!http(401, "unauthorized").is_transient());
    }

    #[test]
    fn credential_and_argument_messages_are_fatal() {
        assert!(http(400, "Invalid API key provided").is_fatal());
        assert!(http(400, "invalid argument: temperature").is_fatal());
        assert!(!http(400, "something else").is_fatal());
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(http(429, "slow down").is_transient());
        assert!(http(500, "internal").is_transient());
        assert!(http(503, "unavailable").is_transient());
        assert!(!http(404, "no such model").is_transient());
    }

    #[test]
    fn transient_keywords_in_message_count() {
        assert!(http(400, "upstream timeout").is_transient());
        assert!(http(400, "model overloaded").is_transient());
        assert!(DecisionError::Network("connect: refused".into()).is_transient());
        assert!(!DecisionError::Network("dns failure".into()).is_transient());
    }

    #[test]
    fn bad_response_is_neither_fatal_nor_transient() {
        let error = DecisionError::BadResponse("not json".into());
        assert!(!error.is_fatal());
        assert!(!error.is_transient());
    }

    #[test]
    fn decision_roundtrip_with_defaults() {
        let json = r#"{"thought":"greet back","goal":null,"task":"reply","strategy":null}"#;
        let decision: Decision = serde_json::from_str(json).unwrap();
        assert_eq!(decision.task.as_deref(), Some("reply"));
        assert!(decision.actions.is_empty());
    }

    #[test]
    fn decision_schema_names_its_fields() {
        let schema = serde_json::to_value(schema_for!(Decision)).unwrap();
        let text = schema.to_string();
        assert!(text.contains("thought"));
        assert!(text.contains("actions"));
        assert!(text.contains("require_feedback"));
    }

    #[test]
    fn request_body_carries_schema_and_prompt() {
        let client = ReasonerClient::new(ReasonerConfig::default());
        let prompt = Prompt {
            system: "you are a bot".into(),
            user: "what now?".into(),
        };
        let body = client.request_body(&prompt);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].content, "what now?");
        assert_eq!(body.response_format.kind, "json_schema");
        assert!(!body.stream);
    }
}
