use ferrocode_core::message::arguments_from_value;
use ferrocode_core::tool::new_call_id;
use ferrocode_core::{NativeToolCall, SourceFormat, ToolInvocation};

/// Normalize structured calls returned by the model API. Provider ids are
/// kept; missing ones are generated.
pub fn normalize_native(calls: &[NativeToolCall]) -> Vec<ToolInvocation> {
    calls
        .iter()
        .map(|call| {
            let id = if call.id.is_empty() {
                new_call_id()
            } else {
                call.id.clone()
            };
            if call.name.trim().is_empty() {
                let mut failure = ToolInvocation::parse_failure(
                    "",
                    SourceFormat::Native,
                    "structured tool call without a function name",
                );
                failure.id = id;
                return failure;
            }
            match arguments_from_value(Some(&call.arguments)) {
                Ok(args) => ToolInvocation::new(id, call.name.clone(), args, SourceFormat::Native),
                Err(reason) => {
                    let mut failure =
                        ToolInvocation::parse_failure(call.name.clone(), SourceFormat::Native, reason);
                    failure.id = id;
                    failure
                }
            }
        })
        .collect()
}
