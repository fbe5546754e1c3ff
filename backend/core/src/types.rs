use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Confidence assigned to any field the operator typed in by hand.
pub const HUMAN_OVERRIDE_CONFIDENCE: f32 = 1.0;

/// Display percentage at or above which a confidence badge reads "high".
const HIGH_BADGE_PERCENT: u8 = 80;

/// Which field an image is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Plate,
    Invoice,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plate => write!(f, "plate"),
            Self::Invoice => write!(f, "invoice"),
        }
    }
}

/// An encoded photo as handed over by the capture layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    /// Encoded image bytes (JPEG from the capture layer).
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            captured_at: Utc::now(),
        }
    }

    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }
}

/// Output of a recognizer before rescaling: confidence on a 0-100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecognition {
    pub text: String,
    pub confidence: f32,
    /// Invoice numbers the recognizer already extracted itself. When set,
    /// fusion uses them instead of running patterns over `text`.
    pub extracted: Option<Vec<String>>,
}

impl RawRecognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            extracted: None,
        }
    }

    /// Already-structured invoice numbers; `text` is kept for logs only.
    pub fn structured(numbers: Vec<String>, confidence: f32) -> Self {
        Self {
            text: numbers.join("\n"),
            confidence,
            extracted: Some(numbers),
        }
    }
}

/// Recognized text for one image with confidence rescaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub raw_text: String,
    pub confidence: f32,
    /// Set when the request failed or timed out and this is a stand-in.
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub processing_time_ms: u64,
    /// Carried over from [`RawRecognition::extracted`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<Vec<String>>,
}

impl RecognitionResult {
    pub fn new(raw_text: impl Into<String>, confidence: f32) -> Self {
        Self {
            raw_text: raw_text.into(),
            confidence: clamp_unit(confidence),
            timed_out: false,
            processing_time_ms: 0,
            extracted: None,
        }
    }

    /// Rescale a 0-100 recognizer confidence into `[0, 1]`.
    pub fn from_raw(raw: RawRecognition) -> Self {
        Self {
            extracted: raw.extracted,
            ..Self::new(raw.text, raw.confidence / 100.0)
        }
    }

    /// Empty, zero-confidence stand-in for a failed or timed-out request.
    pub fn degraded() -> Self {
        Self {
            raw_text: String::new(),
            confidence: 0.0,
            timed_out: true,
            processing_time_ms: 0,
            extracted: None,
        }
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Canonical vehicle registration derived from one plate image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateRecord {
    pub vehicle_number: String,
    pub confidence: f32,
    pub raw_text: String,
    #[serde(default)]
    pub processing_time_ms: u64,
    #[serde(default)]
    pub edited: bool,
}

impl PlateRecord {
    pub fn empty() -> Self {
        Self {
            vehicle_number: String::new(),
            confidence: 0.0,
            raw_text: String::new(),
            processing_time_ms: 0,
            edited: false,
        }
    }
}

/// Reference numbers extracted from one invoice image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    /// Deduplicated, first-seen order.
    pub invoice_numbers: Vec<String>,
    /// Confidence after the extraction adjustment.
    pub confidence: f32,
    pub raw_text: String,
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// Which recognition path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrSource {
    /// Remote `fastOCR` endpoint.
    #[default]
    #[serde(rename = "gas-fast-path")]
    Remote,
    /// Resident on-device recognizer.
    #[serde(rename = "tesseract")]
    Local,
}

impl fmt::Display for OcrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "gas-fast-path"),
            Self::Local => write!(f, "tesseract"),
        }
    }
}

/// Decision-ready result for one plate image and N invoice images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub vehicle_number: String,
    pub vehicle_confidence: f32,
    /// Union across all invoice images, first-seen order.
    pub invoice_numbers: Vec<String>,
    pub invoice_confidence: f32,
    pub needs_fallback: bool,
    #[serde(default)]
    pub vehicle_edited: bool,
    #[serde(default)]
    pub invoices_edited: bool,
    #[serde(default)]
    pub source: OcrSource,
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl AggregateResult {
    /// Replace the vehicle number with an operator-typed value.
    pub fn override_vehicle(&mut self, value: &str) {
        self.vehicle_number = value.trim().to_string();
        self.vehicle_confidence = HUMAN_OVERRIDE_CONFIDENCE;
        self.vehicle_edited = true;
    }

    /// Replace the whole invoice list. Blank entries are dropped and
    /// duplicates collapse to their first occurrence.
    pub fn override_invoices<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut numbers = Vec::new();
        for value in values {
            let value = value.as_ref().trim();
            if !value.is_empty() {
                push_unique(&mut numbers, value.to_string());
            }
        }
        self.invoice_numbers = numbers;
        self.invoice_confidence = HUMAN_OVERRIDE_CONFIDENCE;
        self.invoices_edited = true;
    }

    /// Edit one invoice entry in place. An index past the end appends.
    pub fn override_invoice_at(&mut self, index: usize, value: &str) {
        let mut numbers = self.invoice_numbers.clone();
        if index < numbers.len() {
            numbers[index] = value.to_string();
        } else {
            numbers.push(value.to_string());
        }
        self.override_invoices(numbers);
    }

    pub fn vehicle_badge(&self) -> ConfidenceBadge {
        ConfidenceBadge::for_confidence(self.vehicle_confidence)
    }

    pub fn invoice_badge(&self) -> ConfidenceBadge {
        ConfidenceBadge::for_confidence(self.invoice_confidence)
    }
}

/// Append `value` unless an equal entry is already present.
pub fn push_unique(values: &mut Vec<String>, value: String) -> bool {
    if values.iter().any(|v| v == &value) {
        return false;
    }
    values.push(value);
    true
}

/// Rounded 0-100 percentage for display.
pub fn confidence_percent(confidence: f32) -> u8 {
    (clamp_unit(confidence) * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBadge {
    High,
    Low,
}

impl ConfidenceBadge {
    pub fn for_confidence(confidence: f32) -> Self {
        if confidence_percent(confidence) >= HIGH_BADGE_PERCENT {
            Self::High
        } else {
            Self::Low
        }
    }
}

/// `"lat, lng"` with six decimals, the format stored in submission meta.
pub fn format_location(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.6}, {longitude:.6}")
}

/// Context captured alongside a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMeta {
    pub location: Option<String>,
    pub device_info: String,
    pub capture_time: Option<DateTime<Utc>>,
}

/// A durable record of one submitted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntry {
    pub submission_id: Uuid,
    pub extracted_data: AggregateResult,
    pub meta: SubmissionMeta,
    pub timestamp: DateTime<Utc>,
    /// Flips to true once the remote endpoint confirms; never flips back.
    pub synced: bool,
}

impl SubmissionEntry {
    pub fn new(submission_id: Uuid, extracted_data: AggregateResult, meta: SubmissionMeta) -> Self {
        Self {
            submission_id,
            extracted_data,
            meta,
            timestamp: Utc::now(),
            synced: false,
        }
    }
}

/// Everything the remote endpoint needs for one upload.
#[derive(Debug, Clone)]
pub struct UploadBundle {
    pub submission_id: Uuid,
    pub plate: CapturedImage,
    pub invoices: Vec<CapturedImage>,
    pub extracted: AggregateResult,
    pub meta: SubmissionMeta,
}
