use anyhow::Result;
use async_trait::async_trait;

use crate::types::{CapturedImage, ImageKind, RawRecognition, UploadBundle};

/// An OCR engine: turns one encoded image into text plus a 0-100 confidence.
///
/// Implementations may be remote services or a resident local worker. The
/// pipeline bounds every call with its own timeout and treats any error as
/// a degraded, zero-confidence result.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Engine name used in logs (e.g., "fast-ocr", "tesseract").
    fn name(&self) -> &str;

    async fn recognize(&self, image: &CapturedImage, kind: ImageKind) -> Result<RawRecognition>;
}

/// Delivers a finished submission to the remote system of record.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Returns `Ok(())` only when the remote side confirmed acceptance.
    async fn upload(&self, bundle: &UploadBundle) -> Result<()>;
}
