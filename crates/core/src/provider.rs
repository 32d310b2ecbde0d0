//! Model transport: the abstraction over LLM backends.
//!
//! Only the request/response shape matters to the engine. Implementations
//! (HTTP clients, scripted test doubles) live elsewhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::message::Message;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// Whether the model may emit tool calls for this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    /// Force a plain-text answer (used for checkpoint summaries).
    None,
}

/// Per-call options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOptions {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub tool_choice: ToolChoice,
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: None,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// `call(messages, model, tools, options)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub options: CallOptions,
}

impl ModelRequest {
    /// The same request with tool access disabled.
    pub fn without_tools(mut self) -> Self {
        self.tools.clear();
        self.options.tool_choice = ToolChoice::None;
        self
    }
}

/// A tool call returned natively by the model API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeToolCall {
    pub id: String,
    pub name: String,
    /// An object, or a JSON-encoded string as most providers send it.
    #[serde(default)]
    pub arguments: Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u32,
}

/// `{content, tool_calls|null, usage}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<NativeToolCall>>,

    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// The model transport trait.
///
/// Timeout and retry policy belong to implementations, not to the engine.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// A human-readable name (e.g. "openai").
    fn name(&self) -> &str;

    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;
}
