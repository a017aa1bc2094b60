//! # Scan Code Parser
//!
//! Turns raw scanner text into a [`ScanPayload`].
//!
//! ## Decision Flow
//! ```text
//! raw text
//!    │
//!    ├── exactly 13 ASCII digits? ───────────────► Ean13
//!    │
//!    ▼
//! strip "]d2" / "]Q3" / "]C1" style prefix, trim
//! keep digits and GS (0x1D)
//!    │
//!    ├── AI 01 + 14 digits, or valid AI 17 + 6 digits?
//!    │        yes ───────────────────────────────► DataMatrix
//!    ▼
//! InternalCode (weight = last 3 digits, when ≥ 5 digits)
//! ```
//!
//! The parser is total: every input produces a payload.

use chrono::NaiveDate;

use crate::types::ScanPayload;

/// ASCII group separator used between variable-length GS1 elements.
pub const GROUP_SEPARATOR: char = '\u{1D}';

const AI_GTIN: &str = "01";
const AI_EXPIRY: &str = "17";
const GTIN_LEN: usize = 14;
const EXPIRY_LEN: usize = 6;

// =============================================================================
// Public API
// =============================================================================

/// Parses raw scanner output.
///
/// ## Example
/// ```rust
/// use larder_core::scan::parse;
/// use larder_core::ScanPayload;
///
/// assert_eq!(
///     parse("4601234567890"),
///     ScanPayload::Ean13 { code: "4601234567890".into() }
/// );
/// ```
pub fn parse(raw: &str) -> ScanPayload {
    if raw.len() == 13 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return ScanPayload::Ean13 {
            code: raw.to_string(),
        };
    }

    let cleaned = clean_gs1(raw);
    let gtin = find_gtin(&cleaned);
    let expiry_date = find_expiry(&cleaned, gtin.as_ref().map(|(_, end)| *end));

    if gtin.is_some() || expiry_date.is_some() {
        return ScanPayload::DataMatrix {
            raw: raw.to_string(),
            gtin: gtin.map(|(code, _)| normalize_gtin(&code)),
            expiry_date,
        };
    }

    ScanPayload::InternalCode {
        code: raw.to_string(),
        parsed_weight_grams: internal_weight_grams(raw),
    }
}

/// Reduces a 14-digit GTIN with a leading zero to its 13-digit EAN form.
/// Other values pass through unchanged.
pub fn normalize_gtin(gtin: &str) -> String {
    if gtin.len() == GTIN_LEN && gtin.starts_with('0') {
        gtin[1..].to_string()
    } else {
        gtin.to_string()
    }
}

// =============================================================================
// GS1 Helpers
// =============================================================================

/// Removes the symbology identifier and everything that is not a digit or GS.
fn clean_gs1(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = strip_symbology_prefix(trimmed).trim();
    body.chars()
        .filter(|c| c.is_ascii_digit() || *c == GROUP_SEPARATOR)
        .collect()
}

/// Strips a `]` + letter + digit symbology identifier (`]d2`, `]Q3`, `]C1`).
fn strip_symbology_prefix(value: &str) -> &str {
    let mut chars = value.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(']'), Some(letter), Some(digit))
            if letter.is_ascii_alphabetic() && digit.is_ascii_digit() =>
        {
            &value[3..]
        }
        _ => value,
    }
}

/// Returns the GTIN digits and the byte offset right after them.
fn find_gtin(cleaned: &str) -> Option<(String, usize)> {
    cleaned.match_indices(AI_GTIN).find_map(|(idx, _)| {
        let start = idx + AI_GTIN.len();
        digits_at(cleaned, start, GTIN_LEN).map(|code| (code.to_string(), start + GTIN_LEN))
    })
}

/// Looks for the AI 17 candidate: right after the GTIN element first, then
/// after each group separator, then anywhere. Only the first candidate found
/// is validated.
fn find_expiry(cleaned: &str, after_gtin: Option<usize>) -> Option<NaiveDate> {
    let after_gtin_candidate = after_gtin.and_then(|pos| expiry_digits_at(cleaned, pos));

    let after_gs_candidate = || {
        cleaned
            .match_indices(GROUP_SEPARATOR)
            .find_map(|(idx, sep)| expiry_digits_at(cleaned, idx + sep.len()))
    };

    let anywhere_candidate = || {
        cleaned
            .match_indices(AI_EXPIRY)
            .find_map(|(idx, _)| expiry_digits_at(cleaned, idx))
    };

    let candidate = after_gtin_candidate
        .or_else(after_gs_candidate)
        .or_else(anywhere_candidate)?;

    parse_yymmdd(candidate)
}

/// `17` + six digits starting at `pos`, returning the six digits.
fn expiry_digits_at(cleaned: &str, pos: usize) -> Option<&str> {
    let rest = cleaned.get(pos..)?;
    if !rest.starts_with(AI_EXPIRY) {
        return None;
    }
    digits_at(cleaned, pos + AI_EXPIRY.len(), EXPIRY_LEN)
}

fn digits_at(value: &str, start: usize, len: usize) -> Option<&str> {
    let slice = value.get(start..start + len)?;
    slice.bytes().all(|b| b.is_ascii_digit()).then_some(slice)
}

/// YYMMDD with year 2000 + YY. Month and day are range-checked before the
/// calendar check, so "261332" and "260230" both yield nothing.
fn parse_yymmdd(digits: &str) -> Option<NaiveDate> {
    let yy: i32 = digits.get(0..2)?.parse().ok()?;
    let mm: u32 = digits.get(2..4)?.parse().ok()?;
    let dd: u32 = digits.get(4..6)?.parse().ok()?;

    if !(1..=12).contains(&mm) || !(1..=31).contains(&dd) {
        return None;
    }

    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
}

// =============================================================================
// Internal Codes
// =============================================================================

/// Best-effort weight: the last three digits of codes with at least five digits.
fn internal_weight_grams(code: &str) -> Option<f64> {
    let digits: Vec<char> = code.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 5 {
        return None;
    }
    let tail: String = digits[digits.len() - 3..].iter().collect();
    tail.parse::<f64>().ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
