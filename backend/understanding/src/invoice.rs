//! Invoice / reference number extraction from free-form document text.
//!
//! An ordered list of independent patterns is applied to the text; each may
//! match many times. Results are trimmed, uppercased, length-guarded and
//! collapsed by value in first-seen order.

use anyhow::{Context, Result};
use exitrack_core::push_unique;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Candidates shorter than this are treated as OCR noise.
pub const DEFAULT_MIN_INVOICE_LEN: usize = 3;

const BUILTIN: &[(&str, &str)] = &[
    // INV-DBBA/0325/3219, INV/77, INV12345 (but not the word "Invoice")
    ("inv-code", r"(?i)\bINV(?:[-/][A-Z0-9/\-]+|[0-9][A-Z0-9/\-]*)"),
    ("invoice-no", r"(?i)Invoice\s*(?:No\.?|Number|#)[\s:]*([A-Z0-9_/\-]+)"),
    ("ref-no", r"(?i)Ref\s*(?:No\.?|#)[\s:]*([A-Z0-9_/\-]+)"),
    ("bill-no", r"(?i)Bill\s*(?:No\.?|#)[\s:]*([A-Z0-9_/\-]+)"),
];

static BUILTIN_PATTERNS: Lazy<Vec<InvoicePattern>> = Lazy::new(|| {
    BUILTIN
        .iter()
        .map(|(name, pattern)| InvoicePattern {
            name: (*name).to_string(),
            regex: Regex::new(pattern).unwrap(),
        })
        .collect()
});

/// One named extraction rule. When the regex defines a capture group the
/// first group is the candidate, otherwise the whole match is.
#[derive(Debug, Clone)]
pub struct InvoicePattern {
    name: String,
    regex: Regex,
}

impl InvoicePattern {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern)
            .with_context(|| format!("Invalid invoice pattern '{name}': {pattern}"))?;
        Ok(Self { name, regex })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn candidates<'t>(&'t self, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
        self.regex.captures_iter(text).filter_map(move |caps| {
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str())
        })
    }
}

/// Applies the built-in patterns plus any deployment-specific ones.
#[derive(Debug, Clone)]
pub struct InvoiceExtractor {
    patterns: Vec<InvoicePattern>,
    min_len: usize,
}

impl Default for InvoiceExtractor {
    fn default() -> Self {
        Self {
            patterns: BUILTIN_PATTERNS.clone(),
            min_len: DEFAULT_MIN_INVOICE_LEN,
        }
    }
}

impl InvoiceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append deployment patterns (tax registration, form series, ...) after
    /// the built-in ones. Fails on the first pattern that does not compile.
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, pattern) in patterns.into_iter().enumerate() {
            self.patterns
                .push(InvoicePattern::new(format!("extra-{i}"), pattern.as_ref())?);
        }
        Ok(self)
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    pub fn patterns(&self) -> &[InvoicePattern] {
        &self.patterns
    }

    /// Every distinct candidate in first-seen order; empty when nothing matches.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut numbers = Vec::new();
        if text.trim().is_empty() {
            return numbers;
        }
        for pattern in &self.patterns {
            for candidate in pattern.candidates(text) {
                if self.push_candidate(&mut numbers, candidate) {
                    debug!(pattern = pattern.name(), "Invoice candidate accepted");
                }
            }
        }
        numbers
    }

    /// Numbers a recognizer already extracted. No pattern is applied; each
    /// value is only trimmed, uppercased, length-guarded and deduplicated.
    pub fn accept<I, S>(&self, numbers: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = Vec::new();
        for number in numbers {
            self.push_candidate(&mut accepted, number.as_ref());
        }
        accepted
    }

    fn push_candidate(&self, numbers: &mut Vec<String>, candidate: &str) -> bool {
        let value = candidate.trim().to_uppercase();
        if value.chars().count() < self.min_len {
            return false;
        }
        push_unique(numbers, value)
    }
}
