use std::sync::LazyLock;

use ferrocode_core::{SourceFormat, ToolInvocation};
use regex_lite::Regex;

use super::{CallSite, FormatMatcher, parse_wrapped_body};
use crate::context::ParseContext;

static WRAPPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").unwrap());
static NAMESPACED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<([A-Za-z][\w.-]*):tool_call>(.*?)</([A-Za-z][\w.-]*):tool_call>").unwrap()
});

/// `<tool_call>...</tool_call>` around function tags or a JSON object.
pub struct WrappedMatcher;

impl FormatMatcher for WrappedMatcher {
    fn format(&self) -> SourceFormat {
        SourceFormat::Wrapped
    }

    fn find(&self, text: &str, ctx: &ParseContext) -> Vec<CallSite> {
        WRAPPED
            .captures_iter(text)
            .filter_map(|cap| {
                Some(CallSite {
                    span: cap.get(0)?.range(),
                    invocations: parse_wrapped_body(&cap[1], ctx, SourceFormat::Wrapped),
                })
            })
            .collect()
    }
}

/// `<NS:tool_call>...</NS:tool_call>` as emitted by vendor templates
/// (`minimax:tool_call` and friends).
pub struct NamespacedMatcher;

impl FormatMatcher for NamespacedMatcher {
    fn format(&self) -> SourceFormat {
        SourceFormat::Namespaced
    }

    fn find(&self, text: &str, ctx: &ParseContext) -> Vec<CallSite> {
        NAMESPACED
            .captures_iter(text)
            .filter_map(|cap| {
                let span = cap.get(0)?.range();
                let (open, close) = (&cap[1], &cap[3]);
                let invocations = if open == close {
                    parse_wrapped_body(&cap[2], ctx, SourceFormat::Namespaced)
                } else {
                    vec![ToolInvocation::parse_failure(
                        "",
                        SourceFormat::Namespaced,
                        format!("<{open}:tool_call> closed by </{close}:tool_call>"),
                    )]
                };
                Some(CallSite { span, invocations })
            })
            .collect()
    }
}
