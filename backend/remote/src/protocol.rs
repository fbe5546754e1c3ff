//! Wire types for the remote endpoint.
//!
//! Every call is a single JSON POST distinguished by `action`; every response
//! carries an in-body `status` where only 200 means success.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use exitrack_core::{
    AggregateResult, CapturedImage, ExitrackError, ImageKind, OcrSource, RawRecognition,
    SubmissionMeta, UploadBundle,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode image bytes the way the endpoint expects them.
pub fn encode_data_url(bytes: &[u8]) -> String {
    format!("{}{}", JPEG_DATA_URL_PREFIX, STANDARD.encode(bytes))
}

/// Inverse of [`encode_data_url`]; accepts any `data:<mime>;base64,` prefix.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let Some(rest) = url.strip_prefix("data:") else {
        bail!("Not a data URL");
    };
    let (_, payload) = rest
        .split_once(";base64,")
        .context("Data URL is not base64 encoded")?;
    STANDARD.decode(payload).context("Invalid base64 payload")
}

#[derive(Debug, Serialize)]
pub struct FastOcrRequest {
    action: &'static str,
    pub image: String,
    #[serde(rename = "type")]
    pub kind: ImageKind,
}

impl FastOcrRequest {
    pub fn new(image: &CapturedImage, kind: ImageKind) -> Self {
        Self {
            action: "fastOCR",
            image: encode_data_url(&image.data),
            kind,
        }
    }
}

/// Envelope shared by every action.
#[derive(Debug, Deserialize)]
pub struct EndpointResponse<T> {
    pub status: i64,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> EndpointResponse<T> {
    /// `Ok(data)` for status 200, `Remote` error otherwise.
    pub fn into_result(self) -> Result<Option<T>, ExitrackError> {
        if self.status == 200 {
            Ok(self.data)
        } else {
            Err(ExitrackError::Remote {
                status: self.status,
                message: self.message.unwrap_or_default(),
            })
        }
    }
}

/// Structured `fastOCR` result. Confidence is on a 0-1 scale.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastOcrData {
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub invoice_numbers: Option<Vec<String>>,
    #[serde(default)]
    pub confidence: f32,
}

impl FastOcrData {
    /// Convert to the recognizer contract. The plate number goes through the
    /// normalizer like any other text; invoice numbers are handed over as
    /// already extracted, so no pattern or boost is applied to them again.
    pub fn render(&self, kind: ImageKind) -> RawRecognition {
        let confidence = (self.confidence * 100.0).clamp(0.0, 100.0);
        match kind {
            ImageKind::Plate => {
                RawRecognition::new(self.vehicle_number.clone().unwrap_or_default(), confidence)
            }
            ImageKind::Invoice => {
                RawRecognition::structured(self.invoice_numbers.clone().unwrap_or_default(), confidence)
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadImages {
    pub plate: String,
    pub invoices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadConfidence {
    pub vehicle: f32,
    pub invoices: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub vehicle_number: String,
    pub invoice_numbers: Vec<String>,
    pub confidence: UploadConfidence,
    pub ocr_source: OcrSource,
}

impl From<&AggregateResult> for ExtractedData {
    fn from(result: &AggregateResult) -> Self {
        Self {
            vehicle_number: result.vehicle_number.clone(),
            invoice_numbers: result.invoice_numbers.clone(),
            confidence: UploadConfidence {
                vehicle: result.vehicle_confidence,
                invoices: result.invoice_confidence,
            },
            ocr_source: result.source,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    action: &'static str,
    pub images: UploadImages,
    pub extracted_data: ExtractedData,
    pub submission_id: Uuid,
    pub meta: SubmissionMeta,
}

impl From<&UploadBundle> for UploadRequest {
    fn from(bundle: &UploadBundle) -> Self {
        Self {
            action: "upload",
            images: UploadImages {
                plate: encode_data_url(&bundle.plate.data),
                invoices: bundle
                    .invoices
                    .iter()
                    .map(|i| encode_data_url(&i.data))
                    .collect(),
            },
            extracted_data: ExtractedData::from(&bundle.extracted),
            submission_id: bundle.submission_id,
            meta: bundle.meta.clone(),
        }
    }
}
