// Strict JSON decoding with structured failures.
//
// serde_json reports failures as line/column plus prose. Repair needs the
// failure class and an exact byte offset, so text is first walked by a small
// grammar checker that stops at the first violation. Text that passes the
// checker is handed to serde_json for the actual value.

use std::fmt;

use serde_json::Value;

/// Nesting limit, matching serde_json's default recursion limit.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Raw control character (U+0000..U+001F) inside a string literal.
    ControlChar,
    /// Backslash followed by something that is not a valid escape.
    BadEscape,
    /// Anything else; no local patch applies.
    Unrepairable,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ControlChar => "control_char",
            Self::BadEscape => "bad_escape",
            Self::Unrepairable => "unrepairable",
        }
    }
}

/// First grammar violation found in a candidate.
///
/// `offset` is a byte offset into the candidate. For `ControlChar` it points
/// at the control byte; for `BadEscape` it points at the backslash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub kind: FailureKind,
    pub offset: usize,
    pub message: String,
}

impl DecodeFailure {
    fn new(kind: FailureKind, offset: usize, message: impl Into<String>) -> Self {
        Self { kind, offset, message: message.into() }
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for DecodeFailure {}

/// Decode `text` as a single JSON value.
pub fn decode(text: &str) -> Result<Value, DecodeFailure> {
    Scanner { bytes: text.as_bytes(), pos: 0 }.document()?;
    serde_json::from_str(text)
        .map_err(|e| DecodeFailure::new(FailureKind::Unrepairable, text.len(), e.to_string()))
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

type Scan = Result<(), DecodeFailure>;

impl Scanner<'_> {
    fn document(&mut self) -> Scan {
        self.skip_ws();
        self.value(0)?;
        self.skip_ws();
        if self.pos < self.bytes.len() {
            return Err(self.unrepairable("trailing characters after JSON value"));
        }
        Ok(())
    }

    fn value(&mut self, depth: usize) -> Scan {
        match self.peek() {
            Some(b'{') => self.object(depth + 1),
            Some(b'[') => self.array(depth + 1),
            Some(b'"') => self.string(),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(b't') => self.literal("true"),
            Some(b'f') => self.literal("false"),
            Some(b'n') => self.literal("null"),
            Some(_) => Err(self.unrepairable("expected value")),
            None => Err(self.unrepairable("unexpected end of input")),
        }
    }

    fn object(&mut self, depth: usize) -> Scan {
        self.enter(depth)?;
        self.pos += 1;
        self.skip_ws();
        if self.eat(b'}') {
            return Ok(());
        }
        loop {
            if self.peek() != Some(b'"') {
                return Err(self.unrepairable("expected object key"));
            }
            self.string()?;
            self.skip_ws();
            if !self.eat(b':') {
                return Err(self.unrepairable("expected ':' after object key"));
            }
            self.skip_ws();
            self.value(depth)?;
            self.skip_ws();
            if self.eat(b'}') {
                return Ok(());
            }
            if !self.eat(b',') {
                return Err(self.unrepairable("expected ',' or '}' in object"));
            }
            self.skip_ws();
        }
    }

    fn array(&mut self, depth: usize) -> Scan {
        self.enter(depth)?;
        self.pos += 1;
        self.skip_ws();
        if self.eat(b']') {
            return Ok(());
        }
        loop {
            self.value(depth)?;
            self.skip_ws();
            if self.eat(b']') {
                return Ok(());
            }
            if !self.eat(b',') {
                return Err(self.unrepairable("expected ',' or ']' in array"));
            }
            self.skip_ws();
        }
    }

    fn string(&mut self) -> Scan {
        // Opening quote.
        self.pos += 1;
        loop {
            let Some(byte) = self.peek() else {
                return Err(self.unrepairable("unterminated string"));
            };
            match byte {
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' => self.escape()?,
                0x00..=0x1f => {
                    return Err(DecodeFailure::new(
                        FailureKind::ControlChar,
                        self.pos,
                        "invalid control character in string",
                    ));
                }
                _ => self.pos += 1,
            }
        }
    }

    fn escape(&mut self) -> Scan {
        let backslash = self.pos;
        let bad_escape = || DecodeFailure::new(FailureKind::BadEscape, backslash, "invalid escape");

        match self.bytes.get(backslash + 1) {
            Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => {
                self.pos += 2;
                Ok(())
            }
            Some(b'u') => {
                let unit = self.hex4(backslash + 2).ok_or_else(bad_escape)?;
                self.pos = backslash + 6;
                match unit {
                    0xD800..=0xDBFF => {
                        let low = (self.bytes.get(self.pos) == Some(&b'\\')
                            && self.bytes.get(self.pos + 1) == Some(&b'u'))
                        .then(|| self.hex4(self.pos + 2))
                        .flatten();
                        match low {
                            Some(0xDC00..=0xDFFF) => {
                                self.pos += 6;
                                Ok(())
                            }
                            _ => Err(self.unrepairable_at(backslash, "lone leading surrogate")),
                        }
                    }
                    0xDC00..=0xDFFF => {
                        Err(self.unrepairable_at(backslash, "lone trailing surrogate"))
                    }
                    _ => Ok(()),
                }
            }
            Some(_) => Err(bad_escape()),
            None => Err(self.unrepairable("unterminated string")),
        }
    }

    fn hex4(&self, start: usize) -> Option<u16> {
        let digits = self.bytes.get(start..start + 4)?;
        let digits = std::str::from_utf8(digits).ok()?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u16::from_str_radix(digits, 16).ok()
    }

    fn number(&mut self) -> Scan {
        self.eat(b'-');
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.digits(),
            _ => return Err(self.unrepairable("invalid number")),
        }
        if self.eat(b'.') {
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.unrepairable("expected digit after decimal point"));
            }
            self.digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.unrepairable("expected digit in exponent"));
            }
            self.digits();
        }
        Ok(())
    }

    fn digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn literal(&mut self, word: &str) -> Scan {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(())
        } else {
            Err(self.unrepairable("expected value"))
        }
    }

    fn enter(&self, depth: usize) -> Scan {
        if depth > MAX_DEPTH {
            return Err(self.unrepairable("recursion limit exceeded"));
        }
        Ok(())
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unrepairable(&self, message: &str) -> DecodeFailure {
        self.unrepairable_at(self.pos, message)
    }

    fn unrepairable_at(&self, offset: usize, message: &str) -> DecodeFailure {
        DecodeFailure::new(FailureKind::Unrepairable, offset, message)
    }
}
