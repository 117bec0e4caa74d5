// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Response parsing
//!
//! The model signals actions with markup inside its own text:
//!
//! ```text
//! <thinking>notes</thinking>
//! <tool_call name="read_file"><path>src/lib.rs</path></tool_call>
//! <read_file><path>src/lib.rs</path></read_file>
//! <attempt_completion>final answer</attempt_completion>
//! ```
//!
//! [`ResponseScanner`] extracts these incrementally from a growing buffer:
//! each call to [`ResponseScanner::scan`] reports only what became complete
//! since the previous call. Nothing here fails; text without markers simply
//! yields an empty result.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Opening tag of the completion block
pub const COMPLETION_OPEN: &str = "<attempt_completion>";
/// Closing tag of the completion block
pub const COMPLETION_CLOSE: &str = "</attempt_completion>";
/// Tag name of the generic tool invocation block
pub const TOOL_CALL_TAG: &str = "tool_call";
const THINKING_TAG: &str = "thinking";

/// A tool invocation parsed from model text
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Tool name as the model wrote it
    pub name: String,
    /// Flat parameters; every value is a string at this layer
    pub params: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Add a string parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Render in the canonical `<tool_call>` spelling
    pub fn to_markup(&self) -> String {
        if self.params.is_empty() {
            return format!("<{} name=\"{}\"/>", TOOL_CALL_TAG, self.name);
        }
        let mut out = format!("<{} name=\"{}\">", TOOL_CALL_TAG, self.name);
        for (key, value) in &self.params {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!("<{}>{}</{}>", key, text, key));
        }
        out.push_str(&format!("</{}>", TOOL_CALL_TAG));
        out
    }
}

/// Everything extracted from one model turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Inner text of the first completion block, trimmed
    pub completion: Option<String>,
    /// Tool invocations in the order they appeared
    pub tool_calls: Vec<ToolCall>,
    /// Inner text of each thinking block
    pub thinking: Vec<String>,
}

/// What a turn asks the agent to do. A completion always wins over tool calls.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnAction {
    Complete(String),
    CallTools(Vec<ToolCall>),
    Nothing,
}

impl ParsedResponse {
    /// Whether no marker of any kind was found
    pub fn is_empty(&self) -> bool {
        self.completion.is_none() && self.tool_calls.is_empty() && self.thinking.is_empty()
    }

    /// Collapse into the action the agent takes
    pub fn action(&self) -> TurnAction {
        match (&self.completion, self.tool_calls.is_empty()) {
            (Some(text), _) => TurnAction::Complete(text.clone()),
            (None, false) => TurnAction::CallTools(self.tool_calls.clone()),
            (None, true) => TurnAction::Nothing,
        }
    }
}

/// Newly completed structures from one [`ResponseScanner::scan`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanUpdate {
    /// Tool calls whose closing tag arrived in this call
    pub tool_calls: Vec<ToolCall>,
    /// Thinking blocks closed in this call
    pub thinking: Vec<String>,
    /// Completion text that became safe to show since the last call
    pub completion_delta: String,
    /// Set once, when the completion block closes
    pub completion: Option<String>,
}

/// Restartable scanner over a growing response buffer
///
/// The buffer passed to successive [`scan`](Self::scan) calls must only
/// grow by appending. Already reported structures are never reported again.
#[derive(Debug, Clone)]
pub struct ResponseScanner {
    known_tools: Vec<String>,
    /// Byte offset up to which the buffer has been consumed
    cursor: usize,
    /// Start of the completion's inner text, once the opening tag is seen
    completion_start: Option<usize>,
    /// End of the completion text already handed out as deltas
    streamed: usize,
    done: bool,
    parsed: ParsedResponse,
}

impl ResponseScanner {
    /// Create a scanner that also recognizes `<name>` blocks for these tools
    pub fn new<I, S>(known_tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_tools: known_tools.into_iter().map(Into::into).collect(),
            cursor: 0,
            completion_start: None,
            streamed: 0,
            done: false,
            parsed: ParsedResponse::default(),
        }
    }

    /// Whether the completion block has closed; later text is ignored
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Everything found so far
    pub fn parsed(&self) -> &ParsedResponse {
        &self.parsed
    }

    /// Consume the scanner, returning everything found
    pub fn into_parsed(self) -> ParsedResponse {
        self.parsed
    }

    /// Scan newly appended text. Unterminated blocks are left for a later call.
    pub fn scan(&mut self, buffer: &str) -> ScanUpdate {
        self.scan_inner(buffer, false)
    }

    /// Final scan once the response is complete. Blocks that never closed
    /// are skipped so markers after them are still found.
    pub fn finish(&mut self, buffer: &str) -> ScanUpdate {
        self.scan_inner(buffer, true)
    }

    fn scan_inner(&mut self, buffer: &str, eof: bool) -> ScanUpdate {
        let mut update = ScanUpdate::default();

        while !self.done {
            if let Some(start) = self.completion_start {
                self.scan_completion(buffer, start, eof, &mut update);
                break;
            }

            let Some(rel) = buffer[self.cursor..].find('<') else {
                self.cursor = buffer.len();
                break;
            };
            let open = self.cursor + rel;
            let Some(rel_gt) = buffer[open..].find('>') else {
                // Tag still arriving
                if eof {
                    self.cursor = buffer.len();
                }
                break;
            };
            let tag_end = open + rel_gt + 1;
            let tag = &buffer[open..tag_end];

            match self.classify(tag) {
                Tag::CompletionOpen => {
                    self.completion_start = Some(tag_end);
                    self.streamed = tag_end;
                }
                Tag::SelfClosingCall(name) => {
                    let call = ToolCall::new(name);
                    update.tool_calls.push(call.clone());
                    self.parsed.tool_calls.push(call);
                    self.cursor = tag_end;
                }
                Tag::Block { tag_name, call_name } => {
                    let close = format!("</{}>", tag_name);
                    let Some(rel_close) = buffer[tag_end..].find(&close) else {
                        if eof {
                            self.cursor = tag_end;
                            continue;
                        }
                        self.cursor = open;
                        break;
                    };
                    let inner = &buffer[tag_end..tag_end + rel_close];
                    self.cursor = tag_end + rel_close + close.len();

                    match call_name {
                        Some(name) => {
                            let call = ToolCall {
                                name,
                                params: parse_params(inner),
                            };
                            update.tool_calls.push(call.clone());
                            self.parsed.tool_calls.push(call);
                        }
                        None => {
                            let thought = inner.trim().to_string();
                            update.thinking.push(thought.clone());
                            self.parsed.thinking.push(thought);
                        }
                    }
                }
                Tag::Other => {
                    self.cursor = open + 1;
                }
            }
        }

        update
    }

    fn scan_completion(&mut self, buffer: &str, start: usize, eof: bool, update: &mut ScanUpdate) {
        // The close tag cannot begin before `streamed`: a trailing partial
        // close tag is always held back.
        match buffer[self.streamed..].find(COMPLETION_CLOSE) {
            Some(rel) => {
                let end = self.streamed + rel;
                update.completion_delta = self.take_delta(buffer, self.content_end(buffer, end));
                let text = buffer[start..end].trim().to_string();
                update.completion = Some(text.clone());
                self.parsed.completion = Some(text);
                self.cursor = end + COMPLETION_CLOSE.len();
                self.done = true;
            }
            None if eof => {
                // Never closed: not a completion
                self.cursor = buffer.len();
                self.completion_start = None;
                self.done = true;
            }
            None => {
                let safe_end = buffer.len() - partial_suffix_len(buffer, COMPLETION_CLOSE);
                update.completion_delta = self.take_delta(buffer, self.content_end(buffer, safe_end));
            }
        }
    }

    /// `end` moved back over trailing whitespace, which is only released
    /// once more text follows it
    fn content_end(&self, buffer: &str, end: usize) -> usize {
        if end <= self.streamed {
            return self.streamed;
        }
        self.streamed + buffer[self.streamed..end].trim_end().len()
    }

    fn take_delta(&mut self, buffer: &str, end: usize) -> String {
        if end <= self.streamed {
            return String::new();
        }
        let mut delta = &buffer[self.streamed..end];
        if Some(self.streamed) == self.completion_start {
            // Leading whitespace is not part of the result
            let trimmed = delta.trim_start();
            self.completion_start = Some(self.streamed + (delta.len() - trimmed.len()));
            delta = trimmed;
        }
        self.streamed = end;
        delta.to_string()
    }

    fn classify(&self, tag: &str) -> Tag {
        let body = tag
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or("");
        let self_closing = body.ends_with('/');
        let body = body.trim_end_matches('/');
        let tag_name = body
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("");
        let has_attributes = body.len() > tag_name.len();

        if tag_name.is_empty() || tag_name.starts_with('/') {
            return Tag::Other;
        }

        if tag == COMPLETION_OPEN {
            return Tag::CompletionOpen;
        }

        if tag_name == TOOL_CALL_TAG {
            return match name_attribute(body) {
                Some(name) if self_closing => Tag::SelfClosingCall(name),
                Some(name) => Tag::Block {
                    tag_name: TOOL_CALL_TAG.to_string(),
                    call_name: Some(name),
                },
                None => {
                    tracing::debug!(tag, "Ignoring tool_call tag without a name");
                    Tag::Other
                }
            };
        }

        if has_attributes {
            return Tag::Other;
        }

        if tag_name == THINKING_TAG && !self_closing {
            return Tag::Block {
                tag_name: THINKING_TAG.to_string(),
                call_name: None,
            };
        }

        if self.known_tools.iter().any(|t| t == tag_name) {
            return if self_closing {
                Tag::SelfClosingCall(tag_name.to_string())
            } else {
                Tag::Block {
                    tag_name: tag_name.to_string(),
                    call_name: Some(tag_name.to_string()),
                }
            };
        }

        Tag::Other
    }
}

enum Tag {
    CompletionOpen,
    SelfClosingCall(String),
    /// A block closed by `</tag_name>`; a tool call when `call_name` is set,
    /// otherwise a thinking block
    Block {
        tag_name: String,
        call_name: Option<String>,
    },
    Other,
}

/// Parse a complete response in one pass
pub fn parse_response<S: AsRef<str>>(text: &str, known_tools: &[S]) -> ParsedResponse {
    let mut scanner = ResponseScanner::new(known_tools.iter().map(|t| t.as_ref().to_string()));
    scanner.finish(text);
    scanner.into_parsed()
}

fn name_attribute(tag_body: &str) -> Option<String> {
    static NAME_ATTR: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = NAME_ATTR
        .get_or_init(|| Regex::new(r#"\bname\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok())
        .as_ref()?;
    let captures = regex.captures(tag_body)?;
    let name = captures.get(1).or_else(|| captures.get(2))?.as_str().trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Parse `<key>value</key>` pairs. Values are trimmed; unterminated or
/// malformed entries are skipped.
fn parse_params(inner: &str) -> Map<String, Value> {
    let mut params = Map::new();
    let mut pos = 0;

    while let Some(rel) = inner[pos..].find('<') {
        let open = pos + rel;
        let Some(rel_gt) = inner[open..].find('>') else {
            break;
        };
        let key = &inner[open + 1..open + rel_gt];
        let value_start = open + rel_gt + 1;

        let valid_key = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid_key {
            pos = open + 1;
            continue;
        }

        let close = format!("</{}>", key);
        match inner[value_start..].find(&close) {
            Some(rel_close) => {
                let value = inner[value_start..value_start + rel_close].trim();
                params.insert(key.to_string(), Value::String(value.to_string()));
                pos = value_start + rel_close + close.len();
            }
            None => pos = value_start,
        }
    }

    params
}

/// Length of the longest suffix of `buffer` that is a proper prefix of `tag`
fn partial_suffix_len(buffer: &str, tag: &str) -> usize {
    let max = tag.len().saturating_sub(1).min(buffer.len());
    (1..=max)
        .rev()
        .find(|&len| buffer.is_char_boundary(buffer.len() - len) && tag.starts_with(&buffer[buffer.len() - len..]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOOLS: &[&str] = &["read_file", "write_file"];

    #[test]
    fn test_plain_text_is_empty() {
        let parsed = parse_response("Just chatting, no markers here.", TOOLS);
        assert!(parsed.is_empty());
        assert_eq!(parsed.action(), TurnAction::Nothing);
    }

    #[test]
    fn test_completion_only() {
        let parsed = parse_response(
            "Done.\n<attempt_completion>\n  All <b>good</b>  \n</attempt_completion>",
            TOOLS,
        );
        assert_eq!(parsed.completion.as_deref(), Some("All <b>good</b>"));
        assert_eq!(parsed.action(), TurnAction::Complete("All <b>good</b>".to_string()));
    }

    #[test]
    fn test_first_completion_wins() {
        let parsed = parse_response(
            "<attempt_completion>one</attempt_completion><attempt_completion>two</attempt_completion>",
            TOOLS,
        );
        assert_eq!(parsed.completion.as_deref(), Some("one"));
    }

    #[test]
    fn test_completion_takes_precedence_over_tools() {
        let parsed = parse_response(
            "<tool_call name=\"x\"/><attempt_completion>done</attempt_completion>",
            TOOLS,
        );
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.action(), TurnAction::Complete("done".to_string()));
    }

    #[test]
    fn test_tool_call_self_closing() {
        let parsed = parse_response("<tool_call name=\"x\"/>", TOOLS);
        assert_eq!(parsed.tool_calls, vec![ToolCall::new("x")]);
    }

    #[test]
    fn test_tool_call_with_params() {
        let parsed = parse_response(
            "I'll read it.\n<tool_call name='read_file'>\n  <path> src/lib.rs </path>\n  <limit>20</limit>\n</tool_call>",
            TOOLS,
        );
        assert_eq!(
            parsed.tool_calls,
            vec![ToolCall::new("read_file")
                .with_param("path", "src/lib.rs")
                .with_param("limit", "20")]
        );
    }

    #[test]
    fn test_named_tool_block() {
        let parsed = parse_response(
            "<read_file><path>a.txt</path></read_file><write_file><path>b</path><content>x < y</content></write_file>",
            TOOLS,
        );
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[0].params["path"], "a.txt");
        assert_eq!(parsed.tool_calls[1].params["content"], "x < y");
    }

    #[test]
    fn test_unknown_named_block_ignored_but_unknown_tool_call_returned() {
        let parsed = parse_response(
            "<delete_all><path>/</path></delete_all><tool_call name=\"mystery\"><a>1</a></tool_call>",
            TOOLS,
        );
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "mystery");
    }

    #[test]
    fn test_thinking_collected() {
        let parsed = parse_response(
            "<thinking> plan: read first </thinking><tool_call name=\"read_file\"/>",
            TOOLS,
        );
        assert_eq!(parsed.thinking, vec!["plan: read first"]);
        assert_eq!(parsed.tool_calls.len(), 1);
    }

    #[test]
    fn test_markers_inside_thinking_are_not_actions() {
        let parsed = parse_response(
            "<thinking>maybe <tool_call name=\"x\"/> later</thinking>",
            TOOLS,
        );
        assert!(parsed.tool_calls.is_empty());
        assert_eq!(parsed.thinking.len(), 1);
    }

    #[test]
    fn test_unterminated_completion_is_absent() {
        let parsed = parse_response("<attempt_completion>almost", TOOLS);
        assert!(parsed.completion.is_none());
        assert_eq!(parsed.action(), TurnAction::Nothing);
    }

    #[test]
    fn test_unterminated_tool_call_skipped_at_eof() {
        let parsed = parse_response(
            "<tool_call name=\"a\"><p>1</p> <tool_call name=\"b\"/>",
            TOOLS,
        );
        assert_eq!(parsed.tool_calls, vec![ToolCall::new("b")]);
    }

    #[test]
    fn test_tool_call_without_name_ignored() {
        let parsed = parse_response("<tool_call><a>1</a></tool_call>", TOOLS);
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn test_incremental_scan_reports_each_call_once() {
        let mut scanner = ResponseScanner::new(TOOLS.iter().copied());
        let full = "<tool_call name=\"a\"><p>1</p></tool_call> then <read_file><path>x</path></read_file>";

        let first = scanner.scan(&full[..20]);
        assert!(first.tool_calls.is_empty());

        let second = scanner.scan(&full[..45]);
        assert_eq!(second.tool_calls.len(), 1);
        assert_eq!(second.tool_calls[0].name, "a");

        let third = scanner.scan(full);
        assert_eq!(third.tool_calls.len(), 1);
        assert_eq!(third.tool_calls[0].name, "read_file");

        let again = scanner.scan(full);
        assert!(again.tool_calls.is_empty());
        assert_eq!(scanner.parsed().tool_calls.len(), 2);
    }

    #[test]
    fn test_streaming_completion_deltas_hold_back_partial_close() {
        let mut scanner = ResponseScanner::new(TOOLS.iter().copied());
        let mut buffer = String::from("Sure. <attempt_completion>\nHel");

        let update = scanner.scan(&buffer);
        assert_eq!(update.completion_delta, "Hel");

        buffer.push_str("lo wor");
        assert_eq!(scanner.scan(&buffer).completion_delta, "lo wor");

        buffer.push_str("ld</attempt_comp");
        let update = scanner.scan(&buffer);
        assert_eq!(update.completion_delta, "ld");
        assert!(update.completion.is_none());

        buffer.push_str("letion> trailing <tool_call name=\"x\"/>");
        let update = scanner.scan(&buffer);
        assert_eq!(update.completion_delta, "");
        assert_eq!(update.completion.as_deref(), Some("Hello world"));
        assert!(update.tool_calls.is_empty());
        assert!(scanner.is_done());
    }

    #[test]
    fn test_false_partial_close_is_released() {
        let mut scanner = ResponseScanner::new(Vec::<String>::new());
        let mut buffer = String::from("<attempt_completion>a </");
        assert_eq!(scanner.scan(&buffer).completion_delta, "a");
        buffer.push_str("b>");
        assert_eq!(scanner.scan(&buffer).completion_delta, " </b>");
    }

    #[test]
    fn test_trailing_whitespace_held_until_text_follows() {
        let mut scanner = ResponseScanner::new(Vec::<String>::new());
        let mut buffer = String::from("<attempt_completion>\nHello\n\n");
        assert_eq!(scanner.scan(&buffer).completion_delta, "Hello");

        buffer.push_str("  world \n");
        assert_eq!(scanner.scan(&buffer).completion_delta, "\n\n  world");

        buffer.push_str("\n</attempt_completion>");
        let update = scanner.scan(&buffer);
        assert_eq!(update.completion_delta, "");
        assert_eq!(update.completion.as_deref(), Some("Hello\n\n  world"));
    }

    #[test]
    fn test_to_markup_round_trips() {
        let call = ToolCall::new("read_file").with_param("path", "a.txt");
        assert_eq!(
            call.to_markup(),
            "<tool_call name=\"read_file\"><path>a.txt</path></tool_call>"
        );
        assert_eq!(ToolCall::new("x").to_markup(), "<tool_call name=\"x\"/>");
        assert_eq!(parse_response(&call.to_markup(), TOOLS).tool_calls, vec![call]);
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len("abc</att", COMPLETION_CLOSE), 5);
        assert_eq!(partial_suffix_len("abc<", COMPLETION_CLOSE), 1);
        assert_eq!(partial_suffix_len("abc", COMPLETION_CLOSE), 0);
        assert_eq!(partial_suffix_len("é", COMPLETION_CLOSE), 0);
    }

    fn chunked_parse(text: &str, cuts: &[usize]) -> (ParsedResponse, String) {
        let mut scanner = ResponseScanner::new(TOOLS.iter().copied());
        let mut streamed = String::new();
        let mut boundaries: Vec<usize> = cuts
            .iter()
            .map(|c| c % (text.len() + 1))
            .filter(|&c| text.is_char_boundary(c))
            .collect();
        boundaries.sort_unstable();
        for cut in boundaries {
            streamed.push_str(&scanner.scan(&text[..cut]).completion_delta);
        }
        streamed.push_str(&scanner.finish(text).completion_delta);
        (scanner.into_parsed(), streamed)
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_parse(cuts in proptest::collection::vec(0usize..400, 0..12)) {
            let text = "<thinking>look around</thinking>Let me check.\n\
                <tool_call name=\"read_file\"><path>src/main.rs</path></tool_call>\n\
                <write_file><path>out.txt</path><content>a < b && c</content></write_file>\n\
                <attempt_completion>\nThe answer is <b>42</b>.\n</attempt_completion> bye";

            let whole = parse_response(text, TOOLS);
            let (chunked, streamed) = chunked_parse(text, &cuts);

            prop_assert_eq!(&chunked, &whole);
            prop_assert_eq!(whole.tool_calls.len(), 2);
            prop_assert_eq!(streamed.as_str(), "The answer is <b>42</b>.");
        }

        #[test]
        fn prop_arbitrary_text_never_panics(text in "\\PC{0,200}", cuts in proptest::collection::vec(0usize..200, 0..6)) {
            let _ = chunked_parse(&text, &cuts);
        }
    }
}
