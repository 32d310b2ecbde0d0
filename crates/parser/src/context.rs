//! Tool schemas the matchers consult, and value coercion.

use ferrocode_core::ToolDescriptor;
use serde_json::Value;
use std::collections::HashMap;

/// Schema knowledge available while parsing.
///
/// Tag dialects carry every value as raw text; the schema tells us which
/// values are numbers, booleans or structured JSON, and which parameter a
/// lazy call refers to.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    tools: HashMap<String, ToolDescriptor>,
}

impl ParseContext {
    pub fn new(descriptors: &[ToolDescriptor]) -> Self {
        Self {
            tools: descriptors
                .iter()
                .map(|d| (d.name.clone(), d.clone()))
                .collect(),
        }
    }

    pub fn descriptor(&self, tool: &str) -> Option<&ToolDescriptor> {
        self.tools.get(tool)
    }

    /// The single parameter a lazy call to `tool` fills.
    pub fn sole_parameter(&self, tool: &str) -> Result<String, String> {
        let descriptor = self
            .descriptor(tool)
            .ok_or_else(|| format!("unknown tool '{tool}' in single-value call"))?;
        let required = descriptor.required_parameters();
        if required.len() == 1 {
            return Ok(required[0].to_string());
        }
        let properties: Vec<&String> = descriptor
            .parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().collect())
            .unwrap_or_default();
        if required.is_empty() && properties.len() == 1 {
            return Ok(properties[0].clone());
        }
        Err(format!(
            "cannot infer which parameter '{tool}' expects ({} required); \
             name it with <parameter=NAME>",
            required.len()
        ))
    }

    /// Coerce a raw tag value using the schema's declared type. Values that
    /// do not fit the declared type stay strings; the registry reports the
    /// mismatch as a validation error.
    pub fn coerce_by_schema(&self, tool: &str, key: &str, raw: &str) -> Value {
        let declared = self
            .descriptor(tool)
            .and_then(|d| d.parameter_type(key));
        match declared {
            None | Some("string") => Value::String(raw.to_string()),
            Some(ty) => coerce_typed(raw, ty).unwrap_or_else(|_| Value::String(raw.to_string())),
        }
    }
}

/// Coerce a raw value to an explicitly declared type.
pub fn coerce_typed(raw: &str, ty: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    match ty {
        "string" | "str" | "" => Ok(Value::String(raw.to_string())),
        "integer" | "int" => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{trimmed}' is not an integer")),
        "number" | "float" => match serde_json::from_str::<Value>(trimmed) {
            Ok(v @ Value::Number(_)) => Ok(v),
            _ => Err(format!("'{trimmed}' is not a number")),
        },
        "boolean" | "bool" => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{trimmed}' is not a boolean")),
        },
        "array" => match serde_json::from_str::<Value>(trimmed) {
            Ok(v @ Value::Array(_)) => Ok(v),
            _ => Err(format!("value is not a JSON array: {trimmed}")),
        },
        "object" => match serde_json::from_str::<Value>(trimmed) {
            Ok(v @ Value::Object(_)) => Ok(v),
            _ => Err(format!("value is not a JSON object: {trimmed}")),
        },
        "json" => serde_json::from_str::<Value>(trimmed)
            .map_err(|e| format!("value is not valid JSON: {e}")),
        other => Err(format!("unsupported parameter type '{other}'")),
    }
}

/// Drop one leading and one trailing newline around a raw tag value.
pub fn trim_value(raw: &str) -> &str {
    let s = raw
        .strip_prefix("\r\n")
        .or_else(|| raw.strip_prefix('\n'))
        .unwrap_or(raw);
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}
