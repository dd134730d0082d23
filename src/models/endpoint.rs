//! Endpoint and benchmark request models
//!
//! Defines the remote endpoints under test and the request payload sent to them.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A remote OpenAI-compatible text-generation endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique endpoint name, used as the result key
    pub name: String,
    /// Base URL (e.g. `https://api.openai.com/v1`)
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Admissible model identifiers; the first one is used for benchmarking
    #[serde(default)]
    pub models: Vec<String>,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            models: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.models.push(model.into());
        self
    }

    /// Model used when an endpoint lists several
    pub fn primary_model(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }

    /// API key with everything but the first and last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 8 {
            return "***".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.primary_model() {
            Some(model) => write!(f, "{} ({model})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Chat message role
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

// Unknown roles are sent as user messages.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::from_str(&raw))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single chat message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Payload issued by every request of a benchmark run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkSpec {
    pub messages: Vec<ChatMessage>,
    /// Model override; replaced per endpoint before dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Use the streaming API
    #[serde(default)]
    pub stream: bool,
}

impl BenchmarkSpec {
    /// Single user message spec
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(message)],
            ..Default::default()
        }
    }

    pub fn with_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = (max_tokens > 0).then_some(max_tokens);
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Copy of this spec targeting `model`
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..self.clone()
        }
    }

    /// Text of the first user message, for reporting
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_primary_model() {
        let endpoint = Endpoint::new("openai", "https://api.openai.com/v1", "sk-test")
            .with_model("gpt-4o-mini")
            .with_model("gpt-4o");
        assert_eq!(endpoint.primary_model(), Some("gpt-4o-mini"));
        assert_eq!(endpoint.to_string(), "openai (gpt-4o-mini)");

        let bare = Endpoint::new("local", "http://localhost:8000/v1", "none");
        assert_eq!(bare.primary_model(), None);
    }

    #[test]
    fn test_masked_api_key() {
        let endpoint = Endpoint::new("a", "http://x", "sk-1234567890abcdef");
        assert_eq!(endpoint.masked_api_key(), "sk-1...cdef");

        let short = Endpoint::new("a", "http://x", "short");
        assert_eq!(short.masked_api_key(), "***");
    }

    #[test]
    fn test_role_fallback() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"tool","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::User);

        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"System","content":"be brief"}"#).unwrap();
        assert_eq!(msg.role, Role::System);
    }

    #[test]
    fn test_spec_for_model() {
        let spec = BenchmarkSpec::new("Hello")
            .with_max_tokens(100)
            .streaming(true);
        let targeted = spec.for_model("llama-3");

        assert_eq!(targeted.model.as_deref(), Some("llama-3"));
        assert_eq!(targeted.max_tokens, Some(100));
        assert!(targeted.stream);
        assert_eq!(targeted.messages, spec.messages);
        assert_eq!(spec.model, None);
    }

    #[test]
    fn test_zero_max_tokens_means_unset() {
        let spec = BenchmarkSpec::new("Hello").with_max_tokens(0);
        assert_eq!(spec.max_tokens, None);
        assert_eq!(spec.prompt(), "Hello");
    }
}
