use std::sync::LazyLock;

use ferrocode_core::tool::new_call_id;
use ferrocode_core::{SourceFormat, ToolInvocation};
use regex_lite::Regex;
use serde_json::Map;

use super::{CallSite, FormatMatcher};
use crate::context::{ParseContext, trim_value};

static FUNCTION_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<function=([^>]*)>(.*?)</function>").unwrap());
static FUNCTION_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<function=([^>]*)>").unwrap());
static PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<parameter=([^>]*)>(.*?)</parameter>").unwrap());

const PARAMETER_OPEN: &str = "<parameter=";

fn function_name(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// `<function=NAME><parameter=KEY>VALUE</parameter>...</function>`.
///
/// Also owns unterminated `<function=...>` openings, which become parse
/// failures so the model learns its markup was cut off. An opening only
/// counts as a call when a `<parameter=` tag follows it or nothing but
/// whitespace does; otherwise it is prose that mentions the syntax.
pub struct StandardMatcher;

impl FormatMatcher for StandardMatcher {
    fn format(&self) -> SourceFormat {
        SourceFormat::Standard
    }

    fn find(&self, text: &str, ctx: &ParseContext) -> Vec<CallSite> {
        let mut sites = Vec::new();
        let mut closed = Vec::new();

        for cap in FUNCTION_BLOCK.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            closed.push(whole.range());
            let body = &cap[2];
            if !body.contains(PARAMETER_OPEN) {
                continue;
            }
            sites.push(CallSite {
                span: whole.range(),
                invocations: vec![parse_standard(function_name(&cap[1]), body, ctx)],
            });
        }

        let opens: Vec<_> = FUNCTION_OPEN.captures_iter(text).collect();
        for (i, cap) in opens.iter().enumerate() {
            let Some(open) = cap.get(0) else { continue };
            if closed.iter().any(|r| r.contains(&open.start())) {
                continue;
            }
            let end = opens
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            let rest = &text[open.end()..end];
            let trailing = end == text.len() && rest.trim().is_empty();
            if !rest.contains(PARAMETER_OPEN) && !trailing {
                continue;
            }
            let name = function_name(&cap[1]);
            sites.push(CallSite {
                span: open.start()..end,
                invocations: vec![ToolInvocation::parse_failure(
                    name,
                    SourceFormat::Standard,
                    format!("unterminated <function={name}> block: missing </function>"),
                )],
            });
        }

        sites.sort_by_key(|s| s.span.start);
        sites
    }
}

fn parse_standard(name: &str, body: &str, ctx: &ParseContext) -> ToolInvocation {
    let format = SourceFormat::Standard;
    if name.is_empty() {
        return ToolInvocation::parse_failure(name, format, "function tag without a name");
    }

    let mut arguments = Map::new();
    let mut complete = 0;
    for cap in PARAMETER.captures_iter(body) {
        let key = cap[1].trim();
        if key.is_empty() {
            return ToolInvocation::parse_failure(
                name,
                format,
                format!("parameter tag without a name in call to '{name}'"),
            );
        }
        let value = ctx.coerce_by_schema(name, key, trim_value(&cap[2]));
        arguments.insert(key.to_string(), value);
        complete += 1;
    }

    if body.matches(PARAMETER_OPEN).count() != complete {
        return ToolInvocation::parse_failure(
            name,
            format,
            format!("unterminated <parameter=...> tag in call to '{name}'"),
        );
    }

    ToolInvocation::new(new_call_id(), name, arguments, format)
}

/// `<function=NAME>VALUE</function>`: one bare value, bound to the tool's
/// only required parameter.
pub struct LazyMatcher;

impl FormatMatcher for LazyMatcher {
    fn format(&self) -> SourceFormat {
        SourceFormat::Lazy
    }

    fn find(&self, text: &str, ctx: &ParseContext) -> Vec<CallSite> {
        FUNCTION_BLOCK
            .captures_iter(text)
            .filter(|cap| !cap[2].contains(PARAMETER_OPEN))
            .filter_map(|cap| {
                let span = cap.get(0)?.range();
                Some(CallSite {
                    span,
                    invocations: vec![parse_lazy(function_name(&cap[1]), &cap[2], ctx)],
                })
            })
            .collect()
    }
}

fn parse_lazy(name: &str, body: &str, ctx: &ParseContext) -> ToolInvocation {
    let format = SourceFormat::Lazy;
    if name.is_empty() {
        return ToolInvocation::parse_failure(name, format, "function tag without a name");
    }

    let value = body.trim();
    if value.is_empty() {
        return ToolInvocation::new(new_call_id(), name, Map::new(), format);
    }

    match ctx.sole_parameter(name) {
        Ok(key) => {
            let mut arguments = Map::new();
            let coerced = ctx.coerce_by_schema(name, &key, value);
            arguments.insert(key, coerced);
            ToolInvocation::new(new_call_id(), name, arguments, format)
        }
        Err(reason) => ToolInvocation::parse_failure(name, format, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrocode_core::{PermissionCategory, ToolDescriptor};
    use serde_json::json;

    fn ctx() -> ParseContext {
        ParseContext::new(&[
            ToolDescriptor {
                name: "read_file".into(),
                description: String::new(),
                parameters: json!({
                    "type": "object",
                    "properties": {"file_path": {"type": "string"}, "limit": {"type": "integer"}},
                    "required": ["file_path"]
                }),
                category: PermissionCategory::Read,
                unsafe_tool: false,
            },
            ToolDescriptor {
                name: "list_directory".into(),
                description: String::new(),
                parameters: json!({"type": "object", "properties": {}}),
                category: PermissionCategory::Read,
                unsafe_tool: false,
            },
        ])
    }

    #[test]
    fn standard_with_multiline_value() {
        let text = "<function=read_file>\n<parameter=file_path>\nsrc/main.rs\n</parameter>\n<parameter=limit>\n40\n</parameter>\n</function>";
        let sites = StandardMatcher.find(text, &ctx());
        assert_eq!(sites.len(), 1);
        let call = &sites[0].invocations[0];
        assert_eq!(call.name, "read_file");
        assert_eq!(call.arguments["file_path"], json!("src/main.rs"));
        assert_eq!(call.arguments["limit"], json!(40));
        assert_eq!(sites[0].span, 0..text.len());
    }

    #[test]
    fn standard_ignores_lazy_blocks() {
        let sites = StandardMatcher.find("<function=read_file>a.txt</function>", &ctx());
        assert!(sites.is_empty());
    }

    #[test]
    fn unterminated_parameter_is_parse_error() {
        let text = "<function=read_file><parameter=file_path>a.txt<parameter=limit>3</parameter></function>";
        let sites = StandardMatcher.find(text, &ctx());
        assert!(sites[0].invocations[0].is_parse_error());
    }

    #[test]
    fn unterminated_function_is_parse_error() {
        let text = "Let me look.\n<function=read_file><parameter=file_path>a.txt</parameter>";
        let sites = StandardMatcher.find(text, &ctx());
        assert_eq!(sites.len(), 1);
        let call = &sites[0].invocations[0];
        assert_eq!(call.name, "read_file");
        assert!(call.parse_error.as_deref().unwrap().contains("unterminated"));
        assert_eq!(sites[0].span.end, text.len());
    }

    #[test]
    fn bare_function_tag_at_the_end_is_parse_error() {
        let text = "Reading it now.\n<function=read_file>\n";
        let sites = StandardMatcher.find(text, &ctx());
        assert_eq!(sites.len(), 1);
        assert!(sites[0].invocations[0].is_parse_error());
    }

    #[test]
    fn function_tag_mentioned_in_prose_is_not_a_call() {
        let text = "Tools are called with a `<function=NAME>` tag.\n\nHere is the rest of my answer.";
        assert!(StandardMatcher.find(text, &ctx()).is_empty());
    }

    #[test]
    fn lazy_binds_sole_required_parameter() {
        let sites = LazyMatcher.find("<function=read_file> a.txt </function>", &ctx());
        let call = &sites[0].invocations[0];
        assert_eq!(call.source_format, SourceFormat::Lazy);
        assert_eq!(call.arguments["file_path"], json!("a.txt"));
    }

    #[test]
    fn lazy_empty_body_is_argument_free_call() {
        let sites = LazyMatcher.find("<function=list_directory></function>", &ctx());
        let call = &sites[0].invocations[0];
        assert!(!call.is_parse_error());
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn lazy_unknown_tool_is_parse_error() {
        let sites = LazyMatcher.find("<function=frobnicate>x</function>", &ctx());
        assert!(sites[0].invocations[0].is_parse_error());
    }
}
