//! Parse phase: one recognition per captured image, all in flight at once.
//!
//! Each call carries its own timeout. A call that errors or times out is
//! replaced by a degraded zero-confidence result; siblings keep running.

use std::time::Duration;

use exitrack_core::{CapturedImage, ExitrackError, ImageKind, RecognitionResult, Recognizer};
use exitrack_logging::preview;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-request bound used when nothing else is configured.
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(30);

const TEXT_PREVIEW_CHARS: usize = 200;

/// Recognize one image. Never fails.
pub async fn recognize_one(
    recognizer: &dyn Recognizer,
    image: &CapturedImage,
    kind: ImageKind,
    timeout: Duration,
) -> RecognitionResult {
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, recognizer.recognize(image, kind)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(raw)) => {
            let result = RecognitionResult::from_raw(raw).with_processing_time(elapsed_ms);
            debug!(
                engine = recognizer.name(),
                kind = %kind,
                confidence = result.confidence,
                elapsed_ms,
                text = %preview(&result.raw_text, TEXT_PREVIEW_CHARS),
                "Recognition finished"
            );
            result
        }
        Ok(Err(e)) => {
            let error = ExitrackError::Recognition {
                kind: kind.to_string(),
                message: format!("{e:#}"),
            };
            warn!(engine = recognizer.name(), error = %error, "Degrading to zero confidence");
            RecognitionResult::degraded().with_processing_time(elapsed_ms)
        }
        Err(_) => {
            let error = ExitrackError::Timeout(timeout.as_millis() as u64);
            warn!(engine = recognizer.name(), kind = %kind, error = %error, "Degrading to zero confidence");
            RecognitionResult::degraded().with_processing_time(elapsed_ms)
        }
    }
}

/// Recognize the plate and every invoice concurrently and wait for all of
/// them to settle. Invoice results keep the order of `invoices`.
pub async fn recognize_all(
    recognizer: &dyn Recognizer,
    plate: &CapturedImage,
    invoices: &[CapturedImage],
    timeout: Duration,
) -> (RecognitionResult, Vec<RecognitionResult>) {
    let plate_call = recognize_one(recognizer, plate, ImageKind::Plate, timeout);
    let invoice_calls = join_all(
        invoices
            .iter()
            .map(|image| recognize_one(recognizer, image, ImageKind::Invoice, timeout)),
    );
    tokio::join!(plate_call, invoice_calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use exitrack_core::RawRecognition;

    /// Sleeps `data[0]` seconds, then answers; `data[0] == 0` is an error.
    struct Delayed;

    #[async_trait]
    impl Recognizer for Delayed {
        fn name(&self) -> &str {
            "delayed"
        }

        async fn recognize(&self, image: &CapturedImage, kind: ImageKind) -> Result<RawRecognition> {
            let secs = image.data[0];
            if secs == 0 {
                bail!("engine unavailable");
            }
            tokio::time::sleep(Duration::from_secs(secs as u64)).await;
            Ok(RawRecognition::new(format!("{kind} after {secs}s"), 90.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_only_that_call() {
        let invoices = [CapturedImage::new(vec![5]), CapturedImage::new(vec![40])];
        let (plate, results) =
            recognize_all(&Delayed, &CapturedImage::new(vec![10]), &invoices, DEFAULT_OCR_TIMEOUT).await;

        assert_eq!(plate.raw_text, "plate after 10s");
        assert!((plate.confidence - 0.9).abs() < 1e-6);
        assert!((10_000..10_100).contains(&plate.processing_time_ms));

        assert_eq!(results[0].raw_text, "invoice after 5s");
        assert!(results[1].timed_out);
        assert_eq!(results[1].confidence, 0.0);
        assert!((30_000..30_100).contains(&results[1].processing_time_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn calls_run_concurrently() {
        let started = Instant::now();
        let invoices = vec![CapturedImage::new(vec![20]); 3];
        recognize_all(&Delayed, &CapturedImage::new(vec![20]), &invoices, DEFAULT_OCR_TIMEOUT).await;
        assert!(started.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test]
    async fn error_degrades_to_zero_confidence() {
        let result = recognize_one(&Delayed, &CapturedImage::new(vec![0]), ImageKind::Plate, DEFAULT_OCR_TIMEOUT).await;
        assert!(result.timed_out);
        assert_eq!(result.raw_text, "");
        assert_eq!(result.confidence, 0.0);
    }
}
