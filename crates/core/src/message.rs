//! Message contract.
//!
//! Messages reach the engine in several shapes: our own [`Message`] values,
//! plain JSON records restored from disk, and provider objects whose
//! content may be `null` or a list of text parts and whose tool calls use
//! the `{type, function: {name, arguments}}` envelope. [`MessageView`] is
//! the single accessor surface over all of them, and
//! [`Message::from_view`] normalizes any view into a fresh `Message`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::MessageError;
use crate::tool::{SourceFormat, ToolInvocation};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(MessageError::UnknownRole(other.to_string())),
        }
    }
}

/// A single message in a conversation.
///
/// Values are never mutated once appended to a conversation; normalization
/// always builds a new `Message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Always a string; absent content is stored as `""`.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name for tool results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// An assistant message carrying the invocations parsed from it.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolInvocation>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// A tool result answering `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Build a normalized message from any view.
    pub fn from_view<V: MessageView + ?Sized>(view: &V) -> Result<Self, MessageError> {
        Ok(Self {
            role: view.role()?,
            content: view.content().into_owned(),
            tool_calls: view.tool_calls()?,
            tool_call_id: view.tool_call_id().map(str::to_string),
            name: view.name().map(str::to_string),
        })
    }

    /// Normalize a plain record or provider object.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        Self::from_view(value)
    }

    /// The normalized dict form.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("role".into(), json!(self.role.as_str()));
        obj.insert("content".into(), json!(self.content));
        if !self.tool_calls.is_empty() {
            let calls: Vec<Value> = self
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "name": c.name,
                        "arguments": c.arguments,
                        "source_format": c.source_format,
                    })
                })
                .collect();
            obj.insert("tool_calls".into(), Value::Array(calls));
        }
        if let Some(id) = &self.tool_call_id {
            obj.insert("tool_call_id".into(), json!(id));
        }
        if let Some(name) = &self.name {
            obj.insert("name".into(), json!(name));
        }
        Value::Object(obj)
    }
}

/// The stable accessor surface over heterogeneous message shapes.
pub trait MessageView {
    fn role(&self) -> Result<Role, MessageError>;

    /// Content coerced to a string (`""` when absent).
    fn content(&self) -> Cow<'_, str>;

    fn tool_calls(&self) -> Result<Vec<ToolInvocation>, MessageError>;

    fn tool_call_id(&self) -> Option<&str>;

    fn name(&self) -> Option<&str>;
}

impl MessageView for Message {
    fn role(&self) -> Result<Role, MessageError> {
        Ok(self.role)
    }

    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.content)
    }

    fn tool_calls(&self) -> Result<Vec<ToolInvocation>, MessageError> {
        Ok(self.tool_calls.clone())
    }

    fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl MessageView for Value {
    fn role(&self) -> Result<Role, MessageError> {
        self.get("role")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingField("role"))?
            .parse()
    }

    fn content(&self) -> Cow<'_, str> {
        match self.get("content") {
            Some(Value::String(s)) => Cow::Borrowed(s),
            Some(Value::Array(parts)) => Cow::Owned(
                parts
                    .iter()
                    .filter_map(|p| match p {
                        Value::String(s) => Some(s.as_str()),
                        other => other.get("text").and_then(Value::as_str),
                    })
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            Some(Value::Null) | None => Cow::Borrowed(""),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }

    fn tool_calls(&self) -> Result<Vec<ToolInvocation>, MessageError> {
        match self.get("tool_calls") {
            Some(Value::Array(calls)) => calls.iter().map(invocation_from_value).collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(MessageError::InvalidToolCall(
                "tool_calls must be a list".into(),
            )),
        }
    }

    fn tool_call_id(&self) -> Option<&str> {
        self.get("tool_call_id").and_then(Value::as_str)
    }

    fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }
}

/// Accepts both `{id, name, arguments}` and the provider envelope
/// `{id, type, function: {name, arguments}}`; arguments may be an object or
/// a JSON-encoded string.
pub fn invocation_from_value(value: &Value) -> Result<ToolInvocation, MessageError> {
    let holder = value.get("function").unwrap_or(value);
    let name = holder
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| MessageError::InvalidToolCall("tool call has no name".into()))?;
    let arguments = arguments_from_value(holder.get("arguments"))
        .map_err(|e| MessageError::InvalidToolCall(format!("{name}: {e}")))?;
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(crate::tool::new_call_id);
    let source_format = value
        .get("source_format")
        .and_then(|f| serde_json::from_value::<SourceFormat>(f.clone()).ok())
        .unwrap_or(SourceFormat::Native);
    Ok(ToolInvocation::new(id, name, arguments, source_format))
}

/// Decode tool arguments given as an object, a JSON string, or nothing.
pub fn arguments_from_value(raw: Option<&Value>) -> Result<Map<String, Value>, String> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("arguments must decode to a JSON object".into()),
            Err(e) => Err(format!("arguments are not valid JSON: {e}")),
        },
        Some(_) => Err("arguments must be an object".into()),
    }
}
