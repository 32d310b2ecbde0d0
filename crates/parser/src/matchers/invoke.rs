use std::sync::LazyLock;

use ferrocode_core::tool::new_call_id;
use ferrocode_core::{SourceFormat, ToolInvocation};
use regex_lite::Regex;
use serde_json::Map;

use super::{CallSite, FormatMatcher};
use crate::context::{ParseContext, coerce_typed, trim_value};

static INVOKE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<invoke((?:\s+[\w-]+\s*=\s*"[^"]*")*)\s*>(.*?)</invoke>"#).unwrap());
static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<parameter((?:\s+[\w-]+\s*=\s*"[^"]*")*)\s*>(.*?)</parameter>"#).unwrap()
});
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w-]+)\s*=\s*"([^"]*)""#).unwrap());

const PARAMETER_OPEN: &str = "<parameter";

fn attribute<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    ATTRIBUTE
        .captures_iter(attrs)
        .find(|cap| &cap[1] == key)
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str())
}

/// `<invoke name="..."><parameter name="..." type="...">VALUE</parameter></invoke>`.
///
/// An explicit `type` attribute is authoritative: a value that does not fit
/// it makes the whole call a parse failure. Without one, the schema decides.
pub struct InvokeMatcher;

impl FormatMatcher for InvokeMatcher {
    fn format(&self) -> SourceFormat {
        SourceFormat::Invoke
    }

    fn find(&self, text: &str, ctx: &ParseContext) -> Vec<CallSite> {
        INVOKE_BLOCK
            .captures_iter(text)
            .filter_map(|cap| {
                let span = cap.get(0)?.range();
                let name = attribute(&cap[1], "name").unwrap_or_default().trim();
                Some(CallSite {
                    span,
                    invocations: vec![parse_invoke(name, &cap[2], ctx)],
                })
            })
            .collect()
    }
}

fn parse_invoke(name: &str, body: &str, ctx: &ParseContext) -> ToolInvocation {
    let format = SourceFormat::Invoke;
    if name.is_empty() {
        return ToolInvocation::parse_failure(name, format, "invoke tag without a name attribute");
    }

    let mut arguments = Map::new();
    let mut complete = 0;
    for cap in PARAMETER.captures_iter(body) {
        complete += 1;
        let attrs = &cap[1];
        let Some(key) = attribute(attrs, "name").map(str::trim).filter(|k| !k.is_empty()) else {
            return ToolInvocation::parse_failure(
                name,
                format,
                format!("parameter without a name attribute in call to '{name}'"),
            );
        };
        let raw = trim_value(&cap[2]);
        let value = match attribute(attrs, "type") {
            Some(ty) => match coerce_typed(raw, ty.trim()) {
                Ok(v) => v,
                Err(reason) => {
                    return ToolInvocation::parse_failure(
                        name,
                        format,
                        format!("parameter '{key}' of '{name}': {reason}"),
                    );
                }
            },
            None => ctx.coerce_by_schema(name, key, raw),
        };
        arguments.insert(key.to_string(), value);
    }

    if body.matches(PARAMETER_OPEN).count() != complete {
        return ToolInvocation::parse_failure(
            name,
            format,
            format!("unterminated <parameter> tag in call to '{name}'"),
        );
    }

    ToolInvocation::new(new_call_id(), name, arguments, format)
}
