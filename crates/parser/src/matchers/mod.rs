//! One matcher per text dialect.
//!
//! Each matcher scans the whole response and reports the spans it
//! recognizes. [`crate::ToolCallParser`] runs them in precedence order and
//! drops any span that overlaps one already claimed, so wrapper forms win
//! over the calls nested inside them.

mod function_tag;
mod invoke;
mod json_array;
mod native;
mod wrapper;

pub use function_tag::{LazyMatcher, StandardMatcher};
pub use invoke::InvokeMatcher;
pub use json_array::JsonArrayMatcher;
pub use native::normalize_native;
pub use wrapper::{NamespacedMatcher, WrappedMatcher};

use crate::context::ParseContext;
use ferrocode_core::{SourceFormat, ToolInvocation};
use serde_json::Value;
use std::ops::Range;

/// A recognized region of the response and the calls it yields.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub span: Range<usize>,
    pub invocations: Vec<ToolInvocation>,
}

impl CallSite {
    pub fn overlaps(&self, other: &Range<usize>) -> bool {
        self.span.start < other.end && other.start < self.span.end
    }
}

/// A text dialect recognizer.
pub trait FormatMatcher: Send + Sync {
    fn format(&self) -> SourceFormat;

    /// Every call site of this dialect in `text`, in order of appearance.
    fn find(&self, text: &str, ctx: &ParseContext) -> Vec<CallSite>;
}

/// The built-in matchers in precedence order.
pub fn default_matchers() -> Vec<Box<dyn FormatMatcher>> {
    vec![
        Box::new(NamespacedMatcher),
        Box::new(WrappedMatcher),
        Box::new(InvokeMatcher),
        Box::new(StandardMatcher),
        Box::new(LazyMatcher),
        Box::new(JsonArrayMatcher),
    ]
}

/// Decode a wrapper body: function tags, invoke blocks, or a JSON
/// `{"name", "arguments"}` object. Every resulting invocation is tagged
/// with the wrapper's format.
pub(crate) fn parse_wrapped_body(
    body: &str,
    ctx: &ParseContext,
    format: SourceFormat,
) -> Vec<ToolInvocation> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return vec![ToolInvocation::parse_failure(
            "",
            format,
            "empty tool call wrapper",
        )];
    }

    let mut sites: Vec<CallSite> = StandardMatcher
        .find(body, ctx)
        .into_iter()
        .chain(LazyMatcher.find(body, ctx))
        .chain(InvokeMatcher.find(body, ctx))
        .collect();
    sites.sort_by_key(|site| site.span.start);
    let mut calls: Vec<ToolInvocation> =
        sites.into_iter().flat_map(|site| site.invocations).collect();
    if !calls.is_empty() {
        for call in &mut calls {
            call.source_format = format;
        }
        return calls;
    }

    if trimmed.starts_with('{') {
        return vec![json_object_call(trimmed, format)];
    }

    vec![ToolInvocation::parse_failure(
        "",
        format,
        format!("unrecognized tool call body: {}", preview(trimmed)),
    )]
}

/// `{"name": .., "arguments": ..}` as emitted inside `<tool_call>` by
/// Hermes-style models.
fn json_object_call(raw: &str, format: SourceFormat) -> ToolInvocation {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            return ToolInvocation::parse_failure("", format, format!("invalid JSON tool call: {e}"));
        }
    };
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if name.is_empty() {
        return ToolInvocation::parse_failure("", format, "JSON tool call without a name");
    }
    let arguments = value.get("arguments").or_else(|| value.get("parameters"));
    match ferrocode_core::message::arguments_from_value(arguments) {
        Ok(args) => ToolInvocation::new(ferrocode_core::tool::new_call_id(), name, args, format),
        Err(e) => ToolInvocation::parse_failure(name, format, e),
    }
}

pub(crate) fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}
