// Payload salvage: locate a wiki request inside arbitrary text.
//
// Each text variant (raw, then rich-text cleaned) goes through the same
// strategy ladder:
//
//   1. fenced code blocks, parsed directly then repaired
//   2. the whole text, parsed directly
//   3. the first-`{`-to-last-`}` span, parsed directly
//   4. the same span, repaired
//
// A candidate qualifies when it is an object with a `pages` key; it is
// accepted when, after normalization, `pages` is a non-empty array. Failure
// to find anything is a normal outcome and is only logged.

pub mod clean;
pub mod repair;
pub mod scan;

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::normalize::normalize_object;
use crate::request::RequestError;
use crate::types::WikiRequest;

pub use clean::clean_rich_text;
pub use repair::{repair_decode, RepairFailure, MAX_REPAIRS};
pub use scan::{decode, DecodeFailure, FailureKind};

/// Text fields that commonly carry the payload inside a webhook body.
pub const PAYLOAD_TEXT_FIELDS: [&str; 7] = [
    "task_description",
    "description",
    "Task Description",
    "task_content",
    "content",
    "body",
    "text",
];

/// Minimum length of a string value worth scanning when walking a webhook body.
const MIN_SCAN_STRING_CHARS: usize = 20;

const SNIPPET_BEFORE: usize = 40;
const SNIPPET_AFTER: usize = 60;

/// Outcome of [`extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A normalized request object with a non-empty `pages` array.
    Found(Map<String, Value>),
    NotFound { diagnostics: Option<Diagnostics> },
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<Map<String, Value>> {
        match self {
            Self::Found(map) => Some(map),
            Self::NotFound { .. } => None,
        }
    }

    /// Validate a found object as a [`WikiRequest`].
    pub fn into_request(self) -> Option<Result<WikiRequest, RequestError>> {
        self.found().map(|map| WikiRequest::from_value(Value::Object(map)))
    }
}

/// Positional context for the last repair failure seen during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub failure: DecodeFailure,
    /// Text of the repaired candidate around the failure offset, newlines
    /// rendered as `↵`.
    pub snippet: String,
    pub candidate_len: usize,
}

impl Diagnostics {
    fn new(RepairFailure { failure, repaired }: RepairFailure) -> Self {
        let candidate = repaired.as_str();
        let start = floor_char_boundary(candidate, failure.offset.saturating_sub(SNIPPET_BEFORE));
        let end = floor_char_boundary(candidate, failure.offset.saturating_add(SNIPPET_AFTER));
        let snippet = candidate[start..end].replace('\n', "↵");
        Self { failure, snippet, candidate_len: candidate.len() }
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn fenced_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```(?:\w*\n|\n)?(.*?)```").expect("fenced block pattern should compile")
    })
}

/// Find and normalize a wiki request object in `text`.
pub fn extract(text: &str) -> Extraction {
    let mut diagnostics = None;

    let cleaned = clean_rich_text(text);
    for (label, variant) in [("raw", text.trim()), ("cleaned", cleaned.as_str())] {
        if variant.is_empty() {
            continue;
        }
        if let Some(found) = extract_variant(label, variant, &mut diagnostics) {
            return Extraction::Found(found);
        }
    }

    if let Some(diag) = &diagnostics {
        warn!(
            kind = diag.failure.kind.as_str(),
            offset = diag.failure.offset,
            candidate_len = diag.candidate_len,
            snippet = %diag.snippet,
            "salvage failed after all strategies: {}",
            diag.failure.message
        );
    }
    Extraction::NotFound { diagnostics }
}

fn extract_variant(
    label: &str,
    text: &str,
    diagnostics: &mut Option<Diagnostics>,
) -> Option<Map<String, Value>> {
    for captures in fenced_block().captures_iter(text) {
        let block = captures.get(1).map_or("", |m| m.as_str()).trim();
        if block.is_empty() {
            continue;
        }
        if let Some(found) = accept(decode(block).ok()) {
            debug!(variant = label, "salvaged payload from fenced block");
            return Some(found);
        }
        if let Some(found) = accept(repair_decode(block).ok()) {
            debug!(variant = label, "salvaged payload from repaired fenced block");
            return Some(found);
        }
    }

    if let Some(found) = accept(decode(text).ok()) {
        return Some(found);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let span = &text[start..=end];

    if let Some(found) = accept(decode(span).ok()) {
        return Some(found);
    }

    match repair_decode(span) {
        Ok(value) => {
            let found = accept(Some(value));
            if found.is_some() {
                info!(variant = label, "salvaged payload after iterative repair");
            }
            found
        }
        Err(failure) => {
            *diagnostics = Some(Diagnostics::new(failure));
            None
        }
    }
}

fn accept(value: Option<Value>) -> Option<Map<String, Value>> {
    let Some(Value::Object(map)) = value else {
        return None;
    };
    if !map.contains_key("pages") {
        return None;
    }
    let map = normalize_object(map);
    match map.get("pages") {
        Some(Value::Array(pages)) if !pages.is_empty() => Some(map),
        _ => None,
    }
}

/// Look for a payload inside an already-parsed JSON object, such as a
/// webhook body.
///
/// The object itself counts when it has `pages` alongside `target` or
/// `doc_name`. Otherwise the well-known text fields are salvaged, then every
/// longer string value, recursing into nested objects.
pub fn find_in_object(data: &Map<String, Value>) -> Option<Map<String, Value>> {
    if data.is_empty() {
        return None;
    }

    let has_target = data.contains_key("target") || data.contains_key("doc_name");
    if data.contains_key("pages") && has_target {
        return Some(normalize_object(data.clone()));
    }

    for field in PAYLOAD_TEXT_FIELDS {
        if let Some(Value::String(text)) = data.get(field) {
            if let Some(found) = extract(text).found() {
                return Some(found);
            }
        }
    }

    for value in data.values() {
        let found = match value {
            Value::String(text) if text.chars().count() > MIN_SCAN_STRING_CHARS => {
                extract(text).found()
            }
            Value::Object(nested) => find_in_object(nested),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }

    None
}
