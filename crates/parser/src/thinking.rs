//! `<think>` / `<thinking>` reasoning blocks.
//!
//! Reasoning is shown to the user but never kept in the display text and
//! never scanned for tool calls.

use std::ops::Range;
use std::sync::LazyLock;

use regex_lite::Regex;

static THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").unwrap());
static THINKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<thinking>(.*?)</thinking>").unwrap());
static CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</think(?:ing)?>").unwrap());
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// A reasoning block: `span` covers the tags, `inner` only the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingBlock {
    pub span: Range<usize>,
    pub inner: Range<usize>,
}

/// All reasoning blocks in order. A closing tag with no opener claims
/// everything before it, as models that pre-fill `<think>` emit.
pub fn thinking_blocks(text: &str) -> Vec<ThinkingBlock> {
    let mut blocks: Vec<ThinkingBlock> = THINK
        .captures_iter(text)
        .chain(THINKING.captures_iter(text))
        .filter_map(|cap| {
            Some(ThinkingBlock {
                span: cap.get(0)?.range(),
                inner: cap.get(1)?.range(),
            })
        })
        .collect();

    if let Some(close) = CLOSE.find(text) {
        let claimed = blocks.iter().any(|b| b.span.contains(&close.start()));
        if !claimed && !text[..close.start()].contains("<think") {
            blocks.push(ThinkingBlock {
                span: 0..close.end(),
                inner: 0..close.start(),
            });
        }
    }

    blocks.sort_by_key(|b| b.span.start);
    let mut merged: Vec<ThinkingBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if merged.last().is_some_and(|prev| block.span.start < prev.span.end) {
            continue;
        }
        merged.push(block);
    }
    merged
}

/// The trimmed, non-empty contents of every reasoning block.
pub fn extract_thinking(text: &str) -> Vec<String> {
    thinking_blocks(text)
        .into_iter()
        .map(|b| text[b.inner].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `text` without its reasoning blocks. Returned unchanged when there are
/// none.
pub fn strip_thinking(text: &str) -> String {
    let spans: Vec<Range<usize>> = thinking_blocks(text).into_iter().map(|b| b.span).collect();
    if spans.is_empty() {
        return text.to_string();
    }
    tidy(&remove_spans(text, &spans))
}

/// Cut the given sorted, disjoint spans out of `text`.
pub(crate) fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        out.push_str(&text[last..span.start]);
        last = span.end;
    }
    out.push_str(&text[last..]);
    out
}

/// Collapse blank-line runs left behind by removed blocks.
pub(crate) fn tidy(text: &str) -> String {
    EXCESS_NEWLINES.replace_all(text, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_tag_spellings() {
        let text = "<think>plan A</think>Hello<thinking> plan B </thinking> world";
        assert_eq!(extract_thinking(text), vec!["plan A", "plan B"]);
        assert_eq!(strip_thinking(text), "Hello world");
    }

    #[test]
    fn orphan_close_claims_prefix() {
        let text = "weighing options\n</think>\nThe answer is 4.";
        assert_eq!(extract_thinking(text), vec!["weighing options"]);
        assert_eq!(strip_thinking(text), "The answer is 4.");
    }

    #[test]
    fn no_thinking_is_untouched() {
        let text = "  plain\n\n\n\ntext  ";
        assert_eq!(strip_thinking(text), text);
        assert!(extract_thinking(text).is_empty());
    }

    #[test]
    fn empty_blocks_are_not_reported() {
        assert!(extract_thinking("<think>   </think>hi").is_empty());
        assert_eq!(strip_thinking("<think>   </think>hi"), "hi");
    }
}
