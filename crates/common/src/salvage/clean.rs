// Rich-text cleanup applied before a second round of salvage.
//
// Rich-text editors wrap pasted JSON in markup, entity-encode quotes and swap
// straight quotes for typographic ones. Undo the common cases.

use std::sync::OnceLock;

use regex::Regex;

fn html_tag() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("html tag pattern should compile"))
}

/// Strip tags, decode entities, normalise quotes and odd spaces, then trim.
pub fn clean_rich_text(text: &str) -> String {
    let stripped = html_tag().replace_all(text, "");
    let unescaped = unescape_html(&stripped);

    let mut out = String::with_capacity(unescaped.len());
    for ch in unescaped.chars() {
        match ch {
            '\u{201c}' | '\u{201d}' | '\u{201e}' => out.push('"'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{00a0}' => out.push(' '),
            '\u{200b}' => {}
            other => out.push(other),
        }
    }
    out.trim().to_string()
}

/// Decode named and numeric HTML character references.
///
/// Unknown or malformed references are left as-is.
pub fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_reference(tail) {
            Some((decoded, consumed)) => {
                out.push(decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode the reference at the start of `tail` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_reference(tail: &str) -> Option<(char, usize)> {
    // Longest reference we recognise is well under 12 bytes.
    let semi = tail.get(1..)?.char_indices().take(12).find(|(_, c)| *c == ';')?.0 + 1;
    let name = &tail[1..semi];

    let decoded = if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        named_entity(name)?
    };

    Some((decoded, semi + 1))
}

fn named_entity(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00a0}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "bdquo" => '\u{201e}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "copy" => '\u{00a9}',
        "reg" => '\u{00ae}',
        "trade" => '\u{2122}',
        "laquo" => '\u{00ab}',
        "raquo" => '\u{00bb}',
        "middot" => '\u{00b7}',
        "bull" => '\u{2022}',
        "zwsp" => '\u{200b}',
        _ => return None,
    };
    Some(ch)
}
