//! Tool domain types and the registry seam.
//!
//! The agent never talks to a concrete tool. It sees normalized
//! [`ToolInvocation`]s coming out of the parser and hands them (through the
//! execution policy) to a [`ToolRegistry`], which answers with a typed
//! [`ToolOutput`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Which wire dialect an invocation was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Structured calls returned natively by the model API.
    Native,
    /// `<function=NAME><parameter=KEY>VALUE</parameter></function>`
    Standard,
    /// `<function=NAME>VALUE</function>`, parameter inferred from the schema.
    Lazy,
    /// Standard/lazy form inside `<tool_call>`.
    Wrapped,
    /// Wrapped form with a vendor namespace, e.g. `<minimax:tool_call>`.
    Namespaced,
    /// `<invoke name=..><parameter name=.. type=..>` vocabulary.
    Invoke,
    /// Bare JSON array of `{function:{name, arguments}}`.
    JsonArray,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Native => "native",
            Self::Standard => "standard",
            Self::Lazy => "lazy",
            Self::Wrapped => "wrapped",
            Self::Namespaced => "namespaced",
            Self::Invoke => "invoke",
            Self::JsonArray => "json_array",
        };
        f.write_str(s)
    }
}

/// A normalized request to run a tool, produced by the parser.
///
/// When `parse_error` is set the invocation is a parse-failure record: it
/// keeps the same shape so the error can travel back to the model as a
/// tool result, but it is never executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub source_format: SourceFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
        source_format: SourceFormat,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            source_format,
            parse_error: None,
        }
    }

    /// A parse-failure record for malformed markup in a recognized dialect.
    pub fn parse_failure(
        name: impl Into<String>,
        source_format: SourceFormat,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: new_call_id(),
            name: name.into(),
            arguments: Map::new(),
            source_format,
            parse_error: Some(error.into()),
        }
    }

    pub fn is_parse_error(&self) -> bool {
        self.parse_error.is_some()
    }

    /// Arguments as a JSON object value.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Generate an id for a call recovered from text (`call_` + 24 hex chars).
pub fn new_call_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("call_{}", &hex[..24])
}

/// Permission grouping used to decide auto-execution eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionCategory {
    Read,
    Write,
    Execute,
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Execute => f.write_str("execute"),
        }
    }
}

/// What the registry knows about a tool: schema plus policy metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub category: PermissionCategory,
    /// Unsafe tools are denied outright while safe mode is active.
    #[serde(default)]
    pub unsafe_tool: bool,
}

impl ToolDescriptor {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Names listed under `required` in the parameter schema.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Declared JSON type of a parameter, if the schema states one.
    pub fn parameter_type(&self, key: &str) -> Option<&str> {
        self.parameters
            .get("properties")?
            .get(key)?
            .get("type")?
            .as_str()
    }
}

/// Classification of a failed tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Security,
    Validation,
    Execution,
    None,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Security => f.write_str("security"),
            Self::Validation => f.write_str("validation"),
            Self::Execution => f.write_str("execution"),
            Self::None => f.write_str("none"),
        }
    }
}

/// The registry's answer for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub ok: bool,
    pub content: String,
    pub error_category: ErrorCategory,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
            error_category: ErrorCategory::None,
        }
    }

    pub fn failure(category: ErrorCategory, content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
            error_category: category,
        }
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        let category = match &err {
            ToolError::NotFound(_) | ToolError::InvalidArguments(_) => ErrorCategory::Validation,
            ToolError::PermissionDenied { .. } => ErrorCategory::Security,
            ToolError::ExecutionFailed { .. } | ToolError::Timeout { .. } => {
                ErrorCategory::Execution
            }
        };
        Self::failure(category, err.to_string())
    }
}

/// The content a write-category tool is about to put on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedWrite {
    /// Resolved location on disk.
    pub path: String,
    /// The path as the user should see it (workspace-relative).
    pub display_path: String,
    pub new_content: String,
}

/// The registry seam consumed by the execution policy.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// All tools this registry can execute.
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.descriptors().into_iter().find(|d| d.name == name)
    }

    /// Execute a validated call. Failures are reported in the output, never raised.
    async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutput;

    /// For write tools: the content that executing `arguments` would produce.
    async fn proposed_write(
        &self,
        _name: &str,
        _arguments: &Map<String, Value>,
    ) -> Option<ProposedWrite> {
        None
    }
}

/// A single executable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    fn category(&self) -> PermissionCategory;

    fn is_unsafe(&self) -> bool {
        false
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError>;

    async fn proposed_write(&self, _arguments: &Map<String, Value>) -> Option<ProposedWrite> {
        None
    }

    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            category: self.category(),
            unsafe_tool: self.is_unsafe(),
        }
    }
}

/// A name-indexed collection of [`Tool`]s implementing [`ToolRegistry`].
#[derive(Default)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Check required keys and declared primitive types before a tool runs.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Result<(), ToolError> {
    for key in descriptor.required_parameters() {
        if !arguments.contains_key(key) {
            return Err(ToolError::InvalidArguments(format!(
                "{}: missing required parameter '{key}'",
                descriptor.name
            )));
        }
    }
    for (key, value) in arguments {
        let Some(expected) = descriptor.parameter_type(key) else {
            continue;
        };
        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            return Err(ToolError::InvalidArguments(format!(
                "{}: parameter '{key}' must be of type {expected}",
                descriptor.name
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ToolRegistry for ToolSet {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.to_descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|t| t.to_descriptor())
    }

    async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            return ToolError::NotFound(name.to_string()).into();
        };
        if let Err(e) = validate_arguments(&tool.to_descriptor(), arguments) {
            return e.into();
        }
        debug!(tool = %name, "Executing tool");
        match tool.execute(arguments).await {
            Ok(content) => ToolOutput::success(content),
            Err(e) => e.into(),
        }
    }

    async fn proposed_write(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Option<ProposedWrite> {
        let tool = self.tools.get(name)?;
        if tool.category() != PermissionCategory::Write {
            return None;
        }
        tool.proposed_write(arguments).await
    }
}
