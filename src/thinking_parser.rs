// Reasoning block parser for streaming responses
//
// Implements a small state machine that accumulates the content of <think> spans
// which may open, continue and close across separately delivered fragments.
//
// Key features:
// - Only the tag state and the accumulated reasoning are carried between fragments
// - "Cautious" consumption - a trailing fragment that could be the start of a marker
//   is held back until the next fragment decides it
// - Content after a closing tag is regular content
// - Tag-free "Reasoning Process:" blocks are found by a one-shot scan of final text

use once_cell::sync::Lazy;
use regex::Regex;

pub const OPEN_TAG: &str = "<think>";
pub const CLOSE_TAG: &str = "</think>";

/// Header of a tag-free reasoning block, in either label language
static REASONING_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Reasoning Process|推理过程)\s*[:：]\s*").unwrap());

/// Start of any prediction label; ends a tag-free reasoning block
static LABEL_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Prediction\s*\d+|预测\s*\d+").unwrap());

/// Parser states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    /// Not inside a reasoning span
    Outside,
    /// The most recent fragment boundary fell inside an open <think> span
    InsideTag,
}

/// Result of processing a content fragment through the parser
#[derive(Debug, Default)]
pub struct ThinkingParseResult {
    /// Newly accumulated reasoning text
    pub thinking_content: Option<String>,
    /// Text outside any reasoning span
    pub regular_content: Option<String>,
    /// True if the tag state changed during this feed
    pub state_changed: bool,
}

/// Finite state machine tracking <think> spans in a fragment stream
#[derive(Debug)]
pub struct ThinkingParser {
    /// Current state
    pub state: TagState,
    /// Accumulated reasoning for this session
    reasoning: String,
    /// Trailing text that may be the start of a marker
    pending: String,
    /// Whether an opening tag was ever observed
    tag_seen: bool,
}

impl ThinkingParser {
    pub fn new() -> Self {
        Self {
            state: TagState::Outside,
            reasoning: String::new(),
            pending: String::new(),
            tag_seen: false,
        }
    }

    /// Process one content fragment, in delivery order
    pub fn feed(&mut self, content: &str) -> ThinkingParseResult {
        let mut result = ThinkingParseResult::default();

        if content.is_empty() {
            return result;
        }

        let mut text = std::mem::take(&mut self.pending);
        text.push_str(content);

        let mut thinking = String::new();
        let mut regular = String::new();
        let mut rest = text.as_str();

        loop {
            let marker = match self.state {
                TagState::Outside => OPEN_TAG,
                TagState::InsideTag => CLOSE_TAG,
            };

            if let Some(idx) = rest.find(marker) {
                let before = &rest[..idx];
                match self.state {
                    TagState::Outside => {
                        regular.push_str(before);
                        self.state = TagState::InsideTag;
                        self.tag_seen = true;
                    }
                    TagState::InsideTag => {
                        thinking.push_str(before);
                        self.state = TagState::Outside;
                    }
                }
                result.state_changed = true;
                rest = &rest[idx + marker.len()..];
                continue;
            }

            // No marker - hold back anything that could still become one
            let keep = partial_marker_len(rest, marker);
            let (send_part, hold) = rest.split_at(rest.len() - keep);
            match self.state {
                TagState::Outside => regular.push_str(send_part),
                TagState::InsideTag => thinking.push_str(send_part),
            }
            self.pending = hold.to_string();
            break;
        }

        if !thinking.is_empty() {
            self.reasoning.push_str(&thinking);
            result.thinking_content = Some(thinking);
        }
        if !regular.is_empty() {
            result.regular_content = Some(regular);
        }

        result
    }

    /// Append reasoning delivered outside the content channel.
    ///
    /// Does not touch the tag state.
    pub fn append_reasoning(&mut self, text: &str) {
        self.reasoning.push_str(text);
    }

    /// Finalize parsing when the stream ends
    pub fn finalize(&mut self) -> ThinkingParseResult {
        let mut result = ThinkingParseResult::default();

        if self.pending.is_empty() {
            return result;
        }

        let pending = std::mem::take(&mut self.pending);
        match self.state {
            // Unclosed span at end of stream is still reasoning
            TagState::InsideTag => {
                self.reasoning.push_str(&pending);
                result.thinking_content = Some(pending);
            }
            TagState::Outside => result.regular_content = Some(pending),
        }

        result
    }

    /// Reset parser to initial state
    pub fn reset(&mut self) {
        self.state = TagState::Outside;
        self.reasoning.clear();
        self.pending.clear();
        self.tag_seen = false;
    }

    /// Accumulated reasoning, trimmed.
    ///
    /// The trimmed view of a growing buffer only ever grows.
    pub fn reasoning(&self) -> &str {
        self.reasoning.trim()
    }

    pub fn tag_seen(&self) -> bool {
        self.tag_seen
    }
}

impl Default for ThinkingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&k| text.ends_with(&marker[..k]))
        .unwrap_or(0)
}

/// Remove every <think> span from `text`.
///
/// An opening tag without a matching close removes everything after it.
pub fn strip_think_spans(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN_TAG) {
        out.push_str(&rest[..start]);
        let inner = &rest[start + OPEN_TAG.len()..];
        match inner.find(CLOSE_TAG) {
            Some(end) => rest = &inner[end + CLOSE_TAG.len()..],
            None => return out,
        }
    }

    out.push_str(rest);
    out
}

/// Find a tag-free "Reasoning Process:" / "推理过程:" block.
///
/// The block runs up to the next prediction label or the end of the text.
pub fn extract_reasoning_block(text: &str) -> Option<String> {
    let header = REASONING_HEADER.find(text)?;
    let body = &text[header.end()..];
    let end = LABEL_START.find(body).map(|m| m.start()).unwrap_or(body.len());

    let reasoning = body[..end].trim();
    if reasoning.is_empty() {
        None
    } else {
        Some(reasoning.to_string())
    }
}
