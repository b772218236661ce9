//! Wire types of the progress-event protocol and line classification.
//!
//! Scripts report progress by printing JSON objects of the shape
//!
//! ```json
//! {"event_type": "STEP_COMPLETE", "message": "Collected facts",
//!  "data": {"step": 2, "total_steps": 5}}
//! ```
//!
//! optionally behind a `JSON_PROGRESS:` tag. A final structured result is
//! printed behind `JSON_RESULT:` or as an object with `"type": "result"`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::scanner::{split_segments, Segment};

/// Tag that may precede a progress object.
pub const PROGRESS_PREFIX: &str = "JSON_PROGRESS:";

/// Tag that marks the following object as the run result.
pub const RESULT_PREFIX: &str = "JSON_RESULT:";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ANSI escape pattern is valid")
});

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressEventType {
    OperationStart,
    StepStart,
    StepProgress,
    StepComplete,
    OperationComplete,
    Info,
    Warning,
    Error,
    /// Any tag this version does not know about.
    Unknown,
}

impl ProgressEventType {
    /// Parse the wire tag. Matching is case-insensitive.
    pub fn from_wire(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "OPERATION_START" => Self::OperationStart,
            "STEP_START" => Self::StepStart,
            "STEP_PROGRESS" => Self::StepProgress,
            "STEP_COMPLETE" => Self::StepComplete,
            "OPERATION_COMPLETE" => Self::OperationComplete,
            "INFO" => Self::Info,
            "WARNING" => Self::Warning,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperationStart => "OPERATION_START",
            Self::StepStart => "STEP_START",
            Self::StepProgress => "STEP_PROGRESS",
            Self::StepComplete => "STEP_COMPLETE",
            Self::OperationComplete => "OPERATION_COMPLETE",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ProgressEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProgressEventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProgressEventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&tag))
    }
}

// ---------------------------------------------------------------------------
// Event payload
// ---------------------------------------------------------------------------

/// A single progress message emitted by a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event_type: ProgressEventType,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: ProgressData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Well-known `data` fields. Anything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default, alias = "totalSteps", skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    #[serde(default, alias = "progress", skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressData {
    /// True when `status` reports a failure (`failed`, `error`, `FAILURE`...).
    pub fn reports_failure(&self) -> bool {
        self.status.as_deref().is_some_and(|s| {
            let s = s.to_ascii_lowercase();
            s.starts_with("fail") || s == "error"
        })
    }
}

impl ProgressEvent {
    pub fn new(event_type: ProgressEventType, message: impl Into<String>) -> Self {
        Self {
            event_type,
            message: message.into(),
            data: ProgressData::default(),
            timestamp: None,
        }
    }

    pub fn with_step(mut self, step: u32, total_steps: Option<u32>) -> Self {
        self.data.step = Some(step);
        self.data.total_steps = total_steps;
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// One logical item recovered from an output line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    /// Free text to show in the live log.
    Log(String),
    /// A structured progress event.
    Progress(ProgressEvent),
    /// A structured result object.
    Result(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Progress,
    Result,
}

/// Classify one complete output line.
///
/// A line may yield several items, e.g. two progress objects printed back
/// to back. Blank lines yield nothing.
pub fn classify_line(line: &str) -> Vec<StreamLine> {
    let mut items = Vec::new();
    let mut marker = None;

    for segment in split_segments(line) {
        match segment {
            Segment::Text(text) => {
                let cleaned = strip_ansi(text);
                let (rest, next_marker) = take_marker(cleaned.trim_end());
                if !rest.trim().is_empty() {
                    items.push(StreamLine::Log(rest.to_string()));
                }
                marker = next_marker;
            }
            Segment::Json(value) => {
                items.push(classify_value(value, marker.take()));
            }
        }
    }

    items
}

/// Remove ANSI colour and cursor escape sequences.
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

fn take_marker(text: &str) -> (&str, Option<Marker>) {
    if let Some(rest) = text.strip_suffix(PROGRESS_PREFIX) {
        (rest, Some(Marker::Progress))
    } else if let Some(rest) = text.strip_suffix(RESULT_PREFIX) {
        (rest, Some(Marker::Result))
    } else {
        (text, None)
    }
}

fn classify_value(value: Value, marker: Option<Marker>) -> StreamLine {
    let tagged_result = value.get("type").and_then(Value::as_str) == Some("result");
    if marker == Some(Marker::Result) || tagged_result {
        return StreamLine::Result(value);
    }

    if value.get("event_type").is_some() {
        return match serde_json::from_value::<ProgressEvent>(value.clone()) {
            Ok(event) => StreamLine::Progress(event),
            Err(e) => {
                tracing::debug!(error = %e, "Malformed progress object, keeping as log");
                StreamLine::Log(value.to_string())
            }
        };
    }

    StreamLine::Log(value.to_string())
}
