//! OpenAI-compatible model transport.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, LM Studio, Together AI,
//! and any endpoint that speaks `/chat/completions`.

use std::time::Duration;

use async_trait::async_trait;
use ferrocode_config::ModelConfig;
use ferrocode_core::error::ProviderError;
use ferrocode_core::message::Message;
use ferrocode_core::provider::{
    ModelRequest, ModelResponse, ModelTransport, NativeToolCall, ToolChoice, ToolDefinition, Usage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name sent for calls whose function name could not be recovered.
const UNNAMED_CALL: &str = "invalid_tool_call";

/// A transport for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatTransport {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `[model]` config section. The transport name is
    /// derived from the endpoint host.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ProviderError> {
        if config.api_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured("model.api_url is empty".into()));
        }
        Self::new(
            endpoint_name(&config.api_url),
            &config.api_url,
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our messages to the OpenAI wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: if tc.name.is_empty() {
                                        UNNAMED_CALL.into()
                                    } else {
                                        tc.name.clone()
                                    },
                                    arguments: tc.arguments_value().to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ModelRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.options.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            if request.options.tool_choice == ToolChoice::None {
                body["tool_choice"] = serde_json::json!("none");
            }
        }

        body
    }

    fn into_response(api_response: ApiResponse) -> Result<ModelResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| NativeToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: serde_json::Value::String(tc.function.arguments),
                })
                .collect::<Vec<_>>()
        });

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: Usage {
                total_tokens: api_response.usage.map_or(0, |u| u.total_tokens),
            },
        })
    }
}

/// `https://openrouter.ai/api/v1` → `openrouter.ai`
fn endpoint_name(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split(['/', ':'])
        .next()
        .filter(|host| !host.is_empty())
        .unwrap_or("openai-compatible")
        .to_string()
}

#[async_trait]
impl ModelTransport for OpenAiCompatTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            transport = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Transport returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let parsed = Self::into_response(api_response)?;
        debug!(
            transport = %self.name,
            tokens = parsed.usage.total_tokens,
            native_calls = parsed.tool_calls.as_ref().map_or(0, Vec::len),
            "Completion received"
        );
        Ok(parsed)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u32,
}
