//! Terminal rendering shared by `run` and `chat`.

use ferrocode_core::{ConfirmDecision, ConfirmationRequest};
use serde_json::{Map, Value};

/// Longest tool result echoed to the terminal.
const RESULT_PREVIEW_CHARS: usize = 400;

pub const CONFIRM_PROMPT: &str = "  Allow? [y]es / [a]lways / [N]o: ";

/// Anything that is not an explicit yes declines.
pub fn parse_decision(answer: &str) -> ConfirmDecision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ConfirmDecision::Approve,
        "a" | "always" => ConfirmDecision::ApproveAlways,
        _ => ConfirmDecision::Decline,
    }
}

pub fn compact_arguments(arguments: &Map<String, Value>) -> String {
    serde_json::to_string(arguments).unwrap_or_default()
}

/// First few hundred characters of a tool result, on one line per result.
pub fn preview_result(text: &str) -> String {
    let mut preview: String = text.chars().take(RESULT_PREVIEW_CHARS).collect();
    if preview.len() < text.len() {
        preview.push_str(" ...");
    }
    preview.replace('\n', "\n    ")
}

pub fn render_request(request: &ConfirmationRequest) -> String {
    let mut out = format!(
        "\n  {} wants {} access\n",
        request.tool_name, request.category
    );
    match &request.diff {
        Some(diff) => {
            let label = if diff.existed { "modify" } else { "create" };
            out.push_str(&format!("  {label} {}\n", diff.path));
            for line in diff.unified_diff.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        None => {
            let args = serde_json::to_string_pretty(&request.arguments).unwrap_or_default();
            for line in args.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}
