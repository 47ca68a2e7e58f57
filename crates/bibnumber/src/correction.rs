//! Clean-up of raw OCR strings into bib numbers.
//!
//! OCR engines confuse a handful of letters with digits and often pick up a
//! stray glyph before or after the number. The helpers here undo the common
//! cases and reject everything else.

use log::debug;

/// Replace letters that OCR commonly returns for digits.
///
/// `A→4`, `B→8`, `g→9`, `I→1`, `l→1`, `T→7`. Other characters are kept.
pub fn correct_confusables(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A' => '4',
            'B' => '8',
            'g' => '9',
            'I' | 'l' => '1',
            'T' => '7',
            other => other,
        })
        .collect()
}

/// Strip non-digit characters around a single run of digits.
///
/// `"CD123HG"` becomes `"123"`. `A` and `B` still count as `4` and `8`.
/// When a second digit run follows a gap, the input is returned unchanged so
/// that it fails [`is_number`].
pub fn trim_to_number(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut seen_digit = false;
    let mut in_suffix = false;
    for c in s.chars() {
        let digit = match c {
            'A' => Some('4'),
            'B' => Some('8'),
            c if c.is_ascii_digit() => Some(c),
            _ => None,
        };
        match digit {
            Some(_) if in_suffix && c.is_ascii_digit() => return s.to_string(),
            Some(d) => {
                seen_digit = true;
                out.push(d);
            }
            None if seen_digit => in_suffix = true,
            None => {}
        }
    }
    out
}

/// Non-empty and ASCII digits only.
#[inline]
pub fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Turn raw OCR output into a bib number string, or `None` when the text
/// cannot be a bib number.
///
/// A leading `'0'` marks a partially occluded number and is rejected.
pub fn validate_bib_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with('0') {
        debug!("ocr text {text:?} begins with '0' (partially occluded)");
        return None;
    }
    if is_number(text) {
        return Some(text.to_string());
    }
    let trimmed = trim_to_number(&correct_confusables(text));
    if is_number(&trimmed) {
        Some(trimmed)
    } else {
        debug!("ocr text {text:?} is not a number");
        None
    }
}

/// [`validate_bib_text`] followed by integer conversion.
pub fn parse_bib_number(raw: &str) -> Option<u32> {
    validate_bib_text(raw)?.parse().ok()
}
