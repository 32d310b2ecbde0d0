//! Diff previews for write confirmations.

use ferrocode_core::{DiffPreview, ProposedWrite};
use similar::TextDiff;
use tracing::debug;

/// Compare the current file (absent counts as empty) with the content a
/// write would produce.
pub async fn preview_write(proposed: ProposedWrite) -> DiffPreview {
    let (old_content, existed) = match tokio::fs::read_to_string(&proposed.path).await {
        Ok(content) => (content, true),
        Err(e) => {
            debug!(path = %proposed.path, error = %e, "No existing content for diff preview");
            (String::new(), false)
        }
    };
    build_preview(
        &proposed.display_path,
        old_content,
        proposed.new_content,
        existed,
    )
}

pub fn build_preview(
    path: &str,
    old_content: String,
    new_content: String,
    existed: bool,
) -> DiffPreview {
    let old_label = if existed {
        format!("a/{path}")
    } else {
        "/dev/null".to_string()
    };
    let unified_diff = TextDiff::from_lines(&old_content, &new_content)
        .unified_diff()
        .context_radius(3)
        .header(&old_label, &format!("b/{path}"))
        .to_string();

    DiffPreview {
        path: path.to_string(),
        old_content,
        new_content,
        unified_diff,
        existed,
    }
}
