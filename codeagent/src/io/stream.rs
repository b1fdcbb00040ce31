//! Parse the JSON-lines event stream written by agent backends.
//!
//! Three dialects are recognised per line:
//!
//! - codex: `thread.started` carries `thread_id`; `item.completed` with an
//!   `agent_message` item carries the text (a string or an array of strings).
//! - claude: events with a `message` object (assistant text blocks), or with
//!   `result`/`subtype` (the final result).
//! - gemini: `role`/`delta` events whose `content` is concatenated.
//!
//! When several dialects produce text, gemini wins over claude, claude over codex.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::io::process::LineSink;

/// Lines longer than this are skipped.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

const PREVIEW_CHARS: usize = 100;

/// What the stream yielded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    pub message: String,
    pub session_id: String,
    /// Non-blank lines seen, including unparseable ones.
    pub events: usize,
}

/// Incremental stream parser. Feed lines with [`StreamParser::push_line`].
#[derive(Debug, Default)]
pub struct StreamParser {
    codex_message: String,
    claude_message: String,
    gemini_buffer: String,
    session_id: String,
    events: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }
        self.events += 1;

        let event = match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(line = %preview(line), "failed to parse stream line");
                return;
            }
        };

        if is_codex_event(&event) {
            self.push_codex(&event);
        } else if event.contains_key("message") {
            self.push_claude_message(&event);
        } else if event.contains_key("subtype") || event.contains_key("result") {
            self.push_claude_result(&event);
        } else if event.contains_key("role") || event.contains_key("delta") {
            self.push_gemini(&event);
        } else {
            warn!(line = %preview(line), "unknown event format");
        }
    }

    pub fn finish(self) -> StreamOutcome {
        let message = if !self.gemini_buffer.is_empty() {
            self.gemini_buffer
        } else if !self.claude_message.is_empty() {
            self.claude_message
        } else {
            self.codex_message
        };
        debug!(
            events = self.events,
            message_len = message.len(),
            session_found = !self.session_id.is_empty(),
            "stream parsed"
        );
        StreamOutcome {
            message,
            session_id: self.session_id,
            events: self.events,
        }
    }

    fn push_codex(&mut self, event: &Map<String, Value>) {
        let kind = str_field(event, "type");
        let item_type = event
            .get("item")
            .and_then(|item| item.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(event = self.events, kind, item_type, "codex event");

        match kind {
            "thread.started" => {
                self.session_id = str_field(event, "thread_id").to_string();
            }
            "item.completed" if item_type == "agent_message" => {
                let text = event
                    .get("item")
                    .and_then(|item| item.get("text"))
                    .map(normalize_text)
                    .unwrap_or_default();
                if !text.is_empty() {
                    self.codex_message = text;
                }
            }
            _ => {}
        }
    }

    fn push_claude_message(&mut self, event: &Map<String, Value>) {
        self.adopt_session(str_field(event, "session_id"));

        let message = event.get("message");
        let mut role = str_field(event, "type");
        if let Some(inner) = message.and_then(Value::as_object) {
            self.adopt_session(str_field(inner, "session_id"));
            let inner_role = str_field(inner, "role");
            if !inner_role.is_empty() {
                role = inner_role;
            }
        }

        let text = message.map(extract_claude_text).unwrap_or_default();
        debug!(event = self.events, role, text_len = text.len(), "claude message event");
        if role == "assistant" && !text.is_empty() {
            self.claude_message = text;
        }
    }

    fn push_claude_result(&mut self, event: &Map<String, Value>) {
        self.adopt_session(str_field(event, "session_id"));
        let result = str_field(event, "result");
        debug!(
            event = self.events,
            subtype = str_field(event, "subtype"),
            result_len = result.len(),
            "claude result event"
        );
        if !result.is_empty() {
            self.claude_message = result.to_string();
        }
    }

    fn push_gemini(&mut self, event: &Map<String, Value>) {
        self.adopt_session(str_field(event, "session_id"));
        let content = str_field(event, "content");
        debug!(
            event = self.events,
            role = str_field(event, "role"),
            content_len = content.len(),
            "gemini event"
        );
        self.gemini_buffer.push_str(content);
    }

    fn adopt_session(&mut self, candidate: &str) {
        if self.session_id.is_empty() && !candidate.is_empty() {
            self.session_id = candidate.to_string();
        }
    }
}

impl LineSink for StreamParser {
    fn push_line(&mut self, line: &[u8]) {
        StreamParser::push_line(self, line);
    }

    fn overlong_line(&mut self, preview_bytes: &[u8]) {
        self.events += 1;
        warn!(
            limit = MAX_LINE_BYTES,
            line = %preview(preview_bytes),
            "skipped overlong stream line"
        );
    }
}

fn is_codex_event(event: &Map<String, Value>) -> bool {
    let has_thread = !str_field(event, "thread_id").is_empty();
    let has_item_type = event
        .get("item")
        .and_then(|item| item.get("type"))
        .and_then(Value::as_str)
        .is_some_and(|kind| !kind.is_empty());
    has_thread || has_item_type
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Codex item text: a string, or an array whose string elements are joined.
fn normalize_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Text of a claude message: plain strings, `text` fields, nested `content`.
fn extract_claude_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(extract_claude_text).collect(),
        Value::Object(map) => {
            let text = str_field(map, "text");
            if !text.is_empty() {
                return text.to_string();
            }
            if let Some(content) = map.get("content") {
                return extract_claude_text(content);
            }
            map.get("message")
                .map(extract_claude_text)
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

fn preview(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    if text.chars().count() <= PREVIEW_CHARS {
        return text.into_owned();
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}
