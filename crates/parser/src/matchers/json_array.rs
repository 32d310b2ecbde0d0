use ferrocode_core::message::arguments_from_value;
use ferrocode_core::tool::new_call_id;
use ferrocode_core::{SourceFormat, ToolInvocation};
use serde_json::Value;

use super::{CallSite, FormatMatcher};
use crate::context::ParseContext;

/// A bare JSON array of `{"function": {"name", "arguments"}}` objects, the
/// shape some models print when they imitate the OpenAI wire format.
///
/// Only arrays whose every element carries a `function.name` are claimed;
/// any other JSON in the prose is left alone.
pub struct JsonArrayMatcher;

impl FormatMatcher for JsonArrayMatcher {
    fn format(&self) -> SourceFormat {
        SourceFormat::JsonArray
    }

    fn find(&self, text: &str, _ctx: &ParseContext) -> Vec<CallSite> {
        let mut sites = Vec::new();
        let mut cursor = 0;

        while let Some(offset) = text[cursor..].find('[') {
            let start = cursor + offset;
            let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(Value::Array(items))) if is_call_array(&items) => {
                    let end = start + stream.byte_offset();
                    sites.push(CallSite {
                        span: start..end,
                        invocations: items.iter().map(element_call).collect(),
                    });
                    cursor = end;
                }
                _ => cursor = start + 1,
            }
        }

        sites
    }
}

fn is_call_array(items: &[Value]) -> bool {
    !items.is_empty()
        && items.iter().all(|item| {
            item.get("function")
                .and_then(|f| f.get("name"))
                .is_some_and(Value::is_string)
        })
}

fn element_call(item: &Value) -> ToolInvocation {
    let format = SourceFormat::JsonArray;
    let function = &item["function"];
    let name = function["name"].as_str().unwrap_or_default().trim();
    if name.is_empty() {
        return ToolInvocation::parse_failure("", format, "function entry without a name");
    }
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_call_id);
    match arguments_from_value(function.get("arguments")) {
        Ok(args) => ToolInvocation::new(id, name, args, format),
        Err(reason) => ToolInvocation::parse_failure(name, format, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_array_in_prose() {
        let text = r#"I'll read it. [{"function": {"name": "read_file", "arguments": {"file_path": "a.txt"}}}] Done."#;
        let sites = JsonArrayMatcher.find(text, &ParseContext::default());
        assert_eq!(sites.len(), 1);
        assert_eq!(&text[sites[0].span.clone()].chars().next(), &Some('['));
        assert!(text[sites[0].span.end..].starts_with(" Done."));
        assert_eq!(sites[0].invocations[0].arguments["file_path"], json!("a.txt"));
    }

    #[test]
    fn string_encoded_arguments() {
        let text = r#"[{"id": "x1", "function": {"name": "a", "arguments": "{\"k\": 1}"}}]"#;
        let sites = JsonArrayMatcher.find(text, &ParseContext::default());
        let call = &sites[0].invocations[0];
        assert_eq!(call.id, "x1");
        assert_eq!(call.arguments["k"], json!(1));
    }

    #[test]
    fn ordinary_arrays_are_ignored() {
        let text = "values [1, 2, 3] and [\"a\"] and [{\"name\": \"x\"}] and [unclosed";
        assert!(JsonArrayMatcher.find(text, &ParseContext::default()).is_empty());
    }
}
