// Iterative, failure-driven repair of nearly-JSON text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::scan::{decode, DecodeFailure, FailureKind};

/// Upper bound on local patches applied to one candidate.
pub const MAX_REPAIRS: usize = 5000;

fn trailing_comma() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r",(\s*[}\]])").expect("trailing comma pattern should compile")
    })
}

/// A candidate that could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairFailure {
    pub failure: DecodeFailure,
    /// The candidate with every patch applied so far; `failure.offset` indexes into it.
    pub repaired: String,
}

/// Decode `text`, patching control characters and stray backslashes at the
/// reported offsets until it parses or an unrepairable failure is hit.
pub fn repair_decode(text: &str) -> Result<Value, RepairFailure> {
    let mut buf = trailing_comma().replace_all(text, "$1").into_owned();
    let mut last_offset = 0;

    for _ in 0..MAX_REPAIRS {
        let failure = match decode(&buf) {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };
        last_offset = failure.offset;

        match failure.kind {
            FailureKind::ControlChar => {
                let escaped = match buf.as_bytes()[failure.offset] {
                    b'\n' => "\\n",
                    b'\r' => "\\r",
                    b'\t' => "\\t",
                    _ => "",
                };
                buf.replace_range(failure.offset..failure.offset + 1, escaped);
            }
            FailureKind::BadEscape => buf.insert(failure.offset, '\\'),
            FailureKind::Unrepairable => return Err(RepairFailure { failure, repaired: buf }),
        }
    }

    let failure = DecodeFailure {
        kind: FailureKind::Unrepairable,
        offset: last_offset,
        message: format!("gave up after {MAX_REPAIRS} repairs"),
    };
    Err(RepairFailure { failure, repaired: buf })
}
