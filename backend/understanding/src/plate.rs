//! Plate normalizer: noisy, mixed-script recognizer text to a canonical
//! Bangladeshi registration such as `DHAKA METRO-GA 11-1234`.
//!
//! Stages run in a fixed order and each one assumes the previous ran:
//! digits, region name, class letters, canonical spacing, structural
//! reconstruction. Every stage is total; garbled input degrades to a
//! lower-quality string, never an error.

use exitrack_core::{PlateRecord, RecognitionResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::tables::{CLASSES, DIGITS, REGIONS};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*").unwrap());

static SLASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*/\s*").unwrap());

/// Region words, a 1-4 letter class code that starts on a word boundary,
/// a 2-digit series and a 4-digit number, with optional separators.
static PLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Z ]*?)\s*-?\s*\b([A-Z]{1,4})\s*-?\s*([0-9]{2})\s*-?\s*([0-9]{4})").unwrap()
});

/// Replace Bengali digits with ASCII digits; everything else passes through.
pub fn convert_digits(text: &str) -> String {
    text.chars()
        .map(|c| {
            DIGITS
                .iter()
                .find(|(bengali, _)| *bengali == c)
                .map_or(c, |(_, ascii)| *ascii)
        })
        .collect()
}

/// Transliterate at most one region name, preferring the longest match.
pub fn transliterate_region(text: &str) -> String {
    REGIONS.replace_first(text).unwrap_or_else(|| text.to_string())
}

/// Transliterate every class letter and known ligature.
pub fn transliterate_class(text: &str) -> String {
    CLASSES.replace_all(text)
}

/// Collapse whitespace, tighten `-` and `/`, uppercase, trim.
pub fn canonicalize(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text, " ");
    let dashed = DASH_RE.replace_all(&collapsed, "-");
    let slashed = SLASH_RE.replace_all(&dashed, "/");
    slashed.to_uppercase().trim().to_string()
}

/// Rewrite into `REGION-CLASS SERIES-NUMBER` when the plate grammar is
/// recognizable; otherwise the canonical text is kept unchanged.
///
/// Plates whose digit groups are not exactly 2 and 4 long do not match and
/// stay in their unstructured canonical form.
pub fn reconstruct(text: &str) -> String {
    match PLATE_RE.captures(text) {
        Some(caps) => format!(
            "{}-{} {}-{}",
            caps[1].trim(),
            &caps[2],
            &caps[3],
            &caps[4]
        ),
        None => text.to_string(),
    }
}

/// Run the whole normalization pipeline over raw plate text.
pub fn normalize_plate(raw_text: &str) -> String {
    let text = raw_text.trim();
    if text.is_empty() {
        return String::new();
    }
    let text = convert_digits(text);
    let text = transliterate_region(&text);
    let text = transliterate_class(&text);
    let text = canonicalize(&text);
    reconstruct(&text)
}

/// Build a plate record from one recognition. The recognizer confidence is
/// passed through unchanged; empty text yields an empty zero-confidence record.
pub fn plate_record(result: &RecognitionResult) -> PlateRecord {
    let vehicle_number = normalize_plate(&result.raw_text);
    if vehicle_number.is_empty() {
        return PlateRecord {
            raw_text: result.raw_text.clone(),
            processing_time_ms: result.processing_time_ms,
            ..PlateRecord::empty()
        };
    }
    debug!(vehicle_number = %vehicle_number, confidence = result.confidence, "Normalized plate");
    PlateRecord {
        vehicle_number,
        confidence: result.confidence,
        raw_text: result.raw_text.clone(),
        processing_time_ms: result.processing_time_ms,
        edited: false,
    }
}
