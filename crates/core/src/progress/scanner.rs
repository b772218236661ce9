//! Extraction of JSON objects embedded in a line of text.
//!
//! Scripts occasionally print two progress messages without a newline
//! between them, or prefix a JSON payload with a log tag. The scanner finds
//! every balanced top-level `{...}` span that parses as JSON and returns the
//! text around it untouched.

use serde_json::Value;

/// A piece of a line: free text or a parsed JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Text(&'a str),
    Json(Value),
}

/// Split `line` into text and JSON segments, preserving source order.
///
/// Whitespace-only text between segments is dropped. A `{` with no matching
/// `}` stays in the surrounding text and scanning continues after it.
pub fn split_segments(line: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;

    for (start, end) in brace_spans(line.as_bytes()) {
        // Nested inside an object that was already emitted.
        if start < text_start {
            continue;
        }
        // Both `{` and `}` are ASCII, so these are valid char boundaries.
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&line[start..=end]) {
            push_text(&mut segments, &line[text_start..start]);
            segments.push(Segment::Json(value));
            text_start = end + 1;
        }
    }

    push_text(&mut segments, &line[text_start..]);
    segments
}

fn push_text<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.trim().is_empty() {
        segments.push(Segment::Text(text));
    }
}

/// Every balanced `{...}` span in `bytes`, ordered by opening index.
///
/// Computed in a single pass with a stack of open braces. String literals and
/// backslash escapes are honoured while at least one brace is open; an
/// unmatched `{` produces no span.
fn brace_spans(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable();
    spans
}
