use anyhow::Result;
use async_trait::async_trait;
use exitrack_core::{CapturedImage, ImageKind, RawRecognition, Recognizer};
use tokio::sync::Mutex;
use tracing::debug;

/// Runs a single-worker recognizer one request at a time.
///
/// Waiting for the lock happens inside the caller's future, so a caller's
/// timeout also covers time spent queued; a queued request that runs out of
/// time is dropped from the queue and never reaches the worker.
pub struct SerializedRecognizer<R> {
    name: String,
    inner: Mutex<R>,
}

impl<R: Recognizer> SerializedRecognizer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            name: format!("{} (serialized)", inner.name()),
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl<R: Recognizer> Recognizer for SerializedRecognizer<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, image: &CapturedImage, kind: ImageKind) -> Result<RawRecognition> {
        let worker = self.inner.lock().await;
        debug!(engine = worker.name(), kind = %kind, "Worker acquired");
        worker.recognize(image, kind).await
    }
}
