//! Layered parsing of free-text model replies into a pitch plus suggestions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

static EMBEDDED_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid embedded object regex"));

/// How far parsing got. Callers match on the tag instead of catching errors.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedPitch {
    /// The whole reply was JSON.
    Parsed { pitch: String, recommendations: Vec<Value> },
    /// JSON embedded in prose, or the line heuristic produced something.
    PartiallyParsed { pitch: String, recommendations: Vec<Value> },
    Unparseable,
}

impl ParsedPitch {
    pub fn pitch(&self) -> &str {
        match self {
            Self::Parsed { pitch, .. } | Self::PartiallyParsed { pitch, .. } => pitch,
            Self::Unparseable => "",
        }
    }

    pub fn recommendations(&self) -> &[Value] {
        match self {
            Self::Parsed { recommendations, .. } | Self::PartiallyParsed { recommendations, .. } => {
                recommendations
            }
            Self::Unparseable => &[],
        }
    }
}

pub fn parse_pitch(text: &str) -> ParsedPitch {
    if text.trim().is_empty() {
        return ParsedPitch::Unparseable;
    }

    if let Ok(parsed) = serde_json::from_str::<Value>(text.trim()) {
        return match parsed {
            Value::Object(_) => {
                let (pitch, recommendations) = pitch_fields(&parsed);
                ParsedPitch::Parsed { pitch, recommendations }
            }
            Value::Array(recommendations) => {
                ParsedPitch::Parsed { pitch: String::new(), recommendations }
            }
            Value::String(pitch) => ParsedPitch::Parsed { pitch, recommendations: Vec::new() },
            other => ParsedPitch::Parsed { pitch: other.to_string(), recommendations: Vec::new() },
        };
    }

    if let Some(embedded) = embedded_object(text) {
        let (pitch, recommendations) = pitch_fields(&embedded);
        return ParsedPitch::PartiallyParsed { pitch, recommendations };
    }

    line_heuristic(text)
}

/// The widest `{...}` span of `text`, when it parses as a JSON object.
pub(crate) fn embedded_object(text: &str) -> Option<Value> {
    EMBEDDED_OBJECT_RE
        .find(text)
        .and_then(|found| serde_json::from_str::<Value>(found.as_str()).ok())
        .filter(Value::is_object)
}

fn pitch_fields(object: &Value) -> (String, Vec<Value>) {
    let pitch = match object.get("pitch") {
        Some(Value::String(pitch)) => pitch.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let recommendations = match object.get("recommendations") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    (pitch, recommendations)
}

/// First non-blank line is the pitch; dash-prefixed lines among the next
/// five are suggested titles.
fn line_heuristic(text: &str) -> ParsedPitch {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    let Some(pitch) = lines.first() else {
        return ParsedPitch::Unparseable;
    };

    let recommendations = lines
        .iter()
        .skip(1)
        .take(5)
        .filter_map(|line| line.strip_prefix('-'))
        .map(|title| title.trim_start_matches(['-', ' ']).trim())
        .filter(|title| !title.is_empty())
        .map(|title| json!({ "id": null, "title": title, "reason": "" }))
        .collect();

    ParsedPitch::PartiallyParsed { pitch: (*pitch).to_string(), recommendations }
}
