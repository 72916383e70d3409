//! Text Segmentation
//!
//! Splits raw pasted text into ordered blocks by detecting line-leading
//! enumeration markers. Pure and deterministic; the pipeline assigns each
//! surviving block a dense 1-based index exactly once, here.

use crate::types::WorkItem;
use once_cell::sync::Lazy;
use regex::Regex;

/// Line-leading numbering token: optional leading whitespace, 1-3 digits,
/// one separator (ASCII/full-width period, ASCII/full-width closing paren,
/// ideographic enumeration comma, hyphen), optional trailing whitespace.
static NUMBERING_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[0-9]{1,3}[.．)）、-]\s*").expect("numbering token regex"));

/// One segmented block with its dense 1-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: u32,
    pub text: String,
}

/// Split raw text into ordered segments.
///
/// Lines are scanned in order; a numbering-token match flushes the block
/// accumulated so far, strips the token from the matching line and starts a
/// new block. Non-matching lines (blank lines included) are appended
/// verbatim. If the scan produced exactly one block and no line anywhere in
/// the input carried a numbering token, the whole trimmed input is returned
/// as a single segment. Empty-trimmed blocks are dropped and survivors are
/// renumbered densely from 1 in original order.
pub fn segment_text(raw: &str) -> Vec<Segment> {
    let normalized = raw.replace("\r\n", "\n");

    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut saw_marker = false;

    for line in normalized.lines() {
        if let Some(token) = NUMBERING_TOKEN.find(line) {
            saw_marker = true;
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            current.push_str(&line[token.end()..]);
            current.push('\n');
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    if blocks.len() <= 1 && !saw_marker {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![Segment {
            index: 1,
            text: trimmed.to_string(),
        }];
    }

    blocks
        .into_iter()
        .map(|block| block.trim().to_string())
        .filter(|block| !block.is_empty())
        .zip(1u32..)
        .map(|(text, index)| Segment { index, text })
        .collect()
}

/// Segment raw text directly into work items, preserving segment order.
pub fn segment_into_work_items(raw: &str) -> Vec<WorkItem> {
    segment_text(raw)
        .into_iter()
        .map(|segment| WorkItem::new(segment.index, segment.text))
        .collect()
}
