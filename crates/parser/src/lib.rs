//! # ferrocode parser
//!
//! Recovers tool calls from model output. Models that lack native tool
//! calling (or ignore it) print their calls as text in one of several
//! dialects; this crate normalizes all of them into
//! [`ToolInvocation`]s, splits off `<think>` reasoning, and produces the
//! clean display text.
//!
//! Recognized dialects, in precedence order:
//! 1. native structured calls (when the provider returned any, text is not scanned)
//! 2. `<NS:tool_call>` vendor wrappers
//! 3. `<tool_call>` wrappers (function tags or a JSON object inside)
//! 4. `<invoke name=..>` blocks
//! 5. `<function=NAME><parameter=KEY>..` standard tags
//! 6. `<function=NAME>VALUE</function>` lazy tags
//! 7. bare JSON arrays of `{"function": {..}}`
//!
//! Malformed markup in a recognized dialect is never dropped: it becomes a
//! [`ToolInvocation`] with `parse_error` set, which the engine reports back
//! to the model without executing anything.

pub mod context;
pub mod matchers;
pub mod thinking;

use std::ops::Range;
use std::sync::LazyLock;

use ferrocode_core::{NativeToolCall, ToolDescriptor, ToolInvocation};
use regex_lite::Regex;
use tracing::debug;

pub use context::ParseContext;
pub use matchers::{CallSite, FormatMatcher, default_matchers, normalize_native};
pub use thinking::{extract_thinking, strip_thinking};

static ORPHAN_WRAPPER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?(?:[A-Za-z][\w.-]*:)?tool_call>").unwrap());
static EMPTY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\w-]*\s*```").unwrap());

/// Everything the engine needs from one model response.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub invocations: Vec<ToolInvocation>,
    /// Response text with call markup and reasoning removed.
    pub display_text: String,
    pub thinking: Vec<String>,
}

/// Ordered set of dialect matchers plus the tool schemas they consult.
pub struct ToolCallParser {
    matchers: Vec<Box<dyn FormatMatcher>>,
    context: ParseContext,
}

impl ToolCallParser {
    pub fn new(descriptors: &[ToolDescriptor]) -> Self {
        Self::with_matchers(descriptors, default_matchers())
    }

    /// Use a custom matcher list. Earlier matchers take precedence.
    pub fn with_matchers(
        descriptors: &[ToolDescriptor],
        matchers: Vec<Box<dyn FormatMatcher>>,
    ) -> Self {
        Self {
            matchers,
            context: ParseContext::new(descriptors),
        }
    }

    pub fn context(&self) -> &ParseContext {
        &self.context
    }

    /// Recognized call sites, in order of appearance. Sites inside
    /// reasoning blocks, or overlapping a higher-precedence site, are
    /// discarded.
    pub fn call_sites(&self, text: &str) -> Vec<CallSite> {
        let reserved: Vec<Range<usize>> = thinking::thinking_blocks(text)
            .into_iter()
            .map(|b| b.span)
            .collect();

        let mut accepted: Vec<CallSite> = Vec::new();
        for matcher in &self.matchers {
            for site in matcher.find(text, &self.context) {
                if reserved.iter().any(|r| site.overlaps(r))
                    || accepted.iter().any(|a| site.overlaps(&a.span))
                {
                    continue;
                }
                accepted.push(site);
            }
        }
        accepted.sort_by_key(|s| s.span.start);
        accepted
    }

    /// All tool calls in a response. Structured calls, when present and
    /// non-empty, are authoritative and the text is not scanned.
    pub fn parse(&self, text: &str, structured: Option<&[NativeToolCall]>) -> Vec<ToolInvocation> {
        if let Some(calls) = structured.filter(|c| !c.is_empty()) {
            debug!(count = calls.len(), "Using native tool calls");
            return normalize_native(calls);
        }

        let invocations: Vec<ToolInvocation> = self
            .call_sites(text)
            .into_iter()
            .flat_map(|site| site.invocations)
            .collect();

        if !invocations.is_empty() {
            let malformed = invocations.iter().filter(|c| c.is_parse_error()).count();
            debug!(
                count = invocations.len(),
                malformed, "Recovered tool calls from text"
            );
        }
        invocations
    }

    /// `text` with every recognized call removed. Returned unchanged when
    /// there is no call markup, so the operation is idempotent.
    pub fn strip_markup(&self, text: &str) -> String {
        let spans: Vec<Range<usize>> = self.call_sites(text).into_iter().map(|s| s.span).collect();
        if spans.is_empty() && !ORPHAN_WRAPPER_TAG.is_match(text) {
            return text.to_string();
        }
        let removed = thinking::remove_spans(text, &spans);
        let removed = ORPHAN_WRAPPER_TAG.replace_all(&removed, "");
        let removed = EMPTY_FENCE.replace_all(&removed, "");
        thinking::tidy(&removed)
    }

    /// Calls, reasoning and display text in one pass.
    pub fn analyze(&self, text: &str, structured: Option<&[NativeToolCall]>) -> ParsedResponse {
        ParsedResponse {
            invocations: self.parse(text, structured),
            display_text: strip_thinking(&self.strip_markup(text)),
            thinking: extract_thinking(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrocode_core::{PermissionCategory, SourceFormat};
    use serde_json::{Value, json};

    fn parser() -> ToolCallParser {
        ToolCallParser::new(&[
            ToolDescriptor {
                name: "read_file".into(),
                description: "Read a file".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"file_path": {"type": "string"}},
                    "required": ["file_path"]
                }),
                category: PermissionCategory::Read,
                unsafe_tool: false,
            },
            ToolDescriptor {
                name: "edit_file".into(),
                description: "Edit a file".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "old_text": {"type": "string"},
                        "new_text": {"type": "string"}
                    },
                    "required": ["path", "old_text", "new_text"]
                }),
                category: PermissionCategory::Write,
                unsafe_tool: false,
            },
        ])
    }

    fn name_and_args(calls: &[ToolInvocation]) -> Vec<(String, Value)> {
        calls
            .iter()
            .map(|c| (c.name.clone(), c.arguments_value()))
            .collect()
    }

    #[test]
    fn every_dialect_yields_the_same_call() {
        let p = parser();
        let expected = vec![("read_file".to_string(), json!({"file_path": "a.txt"}))];

        let native = [NativeToolCall {
            id: "call_1".into(),
            name: "read_file".into(),
            arguments: json!("{\"file_path\":\"a.txt\"}"),
        }];
        assert_eq!(name_and_args(&p.parse("", Some(&native[..]))), expected);

        let texts = [
            (SourceFormat::Standard, "<function=read_file>\n<parameter=file_path>\na.txt\n</parameter>\n</function>"),
            (SourceFormat::Lazy, "<function=read_file>a.txt</function>"),
            (SourceFormat::Wrapped, "<tool_call>\n<function=read_file>\n<parameter=file_path>a.txt</parameter>\n</function>\n</tool_call>"),
            (SourceFormat::Namespaced, "<minimax:tool_call>\n<function=read_file>a.txt</function>\n</minimax:tool_call>"),
            (SourceFormat::Invoke, r#"<invoke name="read_file"><parameter name="file_path" type="string">a.txt</parameter></invoke>"#),
            (SourceFormat::JsonArray, r#"[{"function": {"name": "read_file", "arguments": {"file_path": "a.txt"}}}]"#),
        ];
        for (format, text) in texts {
            let calls = p.parse(text, None);
            assert_eq!(name_and_args(&calls), expected, "dialect {format}");
            assert_eq!(calls[0].source_format, format);
        }
    }

    #[test]
    fn native_calls_suppress_text_scanning() {
        let p = parser();
        let native = [NativeToolCall {
            id: "call_1".into(),
            name: "read_file".into(),
            arguments: json!({"file_path": "b.txt"}),
        }];
        let calls = p.parse("<function=read_file>a.txt</function>", Some(&native[..]));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["file_path"], json!("b.txt"));
    }

    #[test]
    fn empty_native_list_falls_back_to_text() {
        let calls = parser().parse("<function=read_file>a.txt</function>", Some(&[][..]));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source_format, SourceFormat::Lazy);
    }

    #[test]
    fn wrapper_claims_its_inner_call_once() {
        let text = "<tool_call><function=read_file>a.txt</function></tool_call>";
        let calls = parser().parse(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source_format, SourceFormat::Wrapped);
    }

    #[test]
    fn mixed_dialects_keep_order_of_appearance() {
        let text = r#"First <invoke name="read_file"><parameter name="file_path">1.txt</parameter></invoke>
then <function=read_file>2.txt</function>
and <tool_call>{"name": "read_file", "arguments": {"file_path": "3.txt"}}</tool_call>"#;
        let calls = parser().parse(text, None);
        let paths: Vec<_> = calls.iter().map(|c| c.arguments["file_path"].clone()).collect();
        assert_eq!(paths, vec![json!("1.txt"), json!("2.txt"), json!("3.txt")]);
    }

    #[test]
    fn lazy_call_with_ambiguous_schema_is_parse_error() {
        let calls = parser().parse("<function=edit_file>x</function>", None);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_parse_error());
        assert_eq!(calls[0].name, "edit_file");
    }

    #[test]
    fn calls_inside_reasoning_are_ignored() {
        let text = "<think>maybe <function=read_file>x.txt</function></think>Answer.";
        let p = parser();
        assert!(p.parse(text, None).is_empty());
        assert_eq!(p.strip_markup(text), text);
    }

    #[test]
    fn strip_markup_without_markup_is_identity() {
        let p = parser();
        let text = "  Plain answer.\n\n\n\nWith odd spacing.  ";
        assert_eq!(p.strip_markup(text), text);
    }

    #[test]
    fn strip_markup_is_idempotent() {
        let p = parser();
        let text = "Reading now.\n\n<tool_call>\n<function=read_file>a.txt</function>\n</tool_call>\n\n\n\nThen done.";
        let once = p.strip_markup(text);
        assert_eq!(once, "Reading now.\n\nThen done.");
        assert_eq!(p.strip_markup(&once), once);
    }

    #[test]
    fn strip_markup_removes_emptied_fences_and_orphan_tags() {
        let p = parser();
        let text = "Calling:\n```json\n[{\"function\": {\"name\": \"read_file\", \"arguments\": {}}}]\n```\n</tool_call>";
        assert_eq!(p.strip_markup(text), "Calling:");
    }

    #[test]
    fn thinking_and_markup_passes_commute() {
        let p = parser();
        let text = "<think>plan</think>Looking.\n<function=read_file>a.txt</function>\nOk.";
        let a = strip_thinking(&p.strip_markup(text));
        let b = p.strip_markup(&strip_thinking(text));
        assert_eq!(a, b);
        assert_eq!(a, "Looking.\n\nOk.");
    }

    #[test]
    fn prose_about_function_tags_keeps_the_whole_answer() {
        let text = "Tools are called with a `<function=NAME>` tag.\n\nHere is the rest of my answer, which the user needs.";
        let parsed = parser().analyze(text, None);
        assert!(parsed.invocations.is_empty());
        assert_eq!(parsed.display_text, text);
    }

    #[test]
    fn analyze_splits_everything() {
        let p = parser();
        let parsed = p.analyze("<thinking>need file</thinking>Sure.<function=read_file>a.txt</function>", None);
        assert_eq!(parsed.invocations.len(), 1);
        assert_eq!(parsed.thinking, vec!["need file"]);
        assert_eq!(parsed.display_text, "Sure.");
    }
}
