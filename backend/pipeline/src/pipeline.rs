use std::sync::Arc;
use std::time::Duration;

use exitrack_core::{
    AggregateResult, ExitrackError, OcrSource, PipelineEvent, Recognizer, SubmissionEntry,
    SubmissionMeta, UploadBundle, Uploader,
};
use exitrack_fusion::FusionEngine;
use exitrack_store::SubmissionStore;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, instrument};

use crate::parse::{recognize_all, DEFAULT_OCR_TIMEOUT};
use crate::session::Session;
use crate::submit::{SubmitReceipt, SyncTask, DEFAULT_UPLOAD_TIMEOUT};

const EVENT_CAPACITY: usize = 64;

/// Runs parse and submit for capture sessions.
///
/// The pipeline owns no session state; each call borrows the session it
/// works on, so any number of sessions can share one pipeline.
pub struct Pipeline {
    recognizer: Arc<dyn Recognizer>,
    uploader: Arc<dyn Uploader>,
    store: Arc<SubmissionStore>,
    engine: FusionEngine,
    source: OcrSource,
    ocr_timeout: Duration,
    upload_timeout: Duration,
    device_info: String,
    events: broadcast::Sender<PipelineEvent>,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        uploader: Arc<dyn Uploader>,
        store: Arc<SubmissionStore>,
        engine: FusionEngine,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            recognizer,
            uploader,
            store,
            engine,
            source: OcrSource::default(),
            ocr_timeout: DEFAULT_OCR_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            device_info: default_device_info(),
            events,
        }
    }

    pub fn with_source(mut self, source: OcrSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_device_info(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = device_info.into();
        self
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<SubmissionStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Same events as [`Pipeline::subscribe`], as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<PipelineEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Recognize every captured image and fuse the results. Performs no
    /// durable writes. May be called again on the same session; operator
    /// edits are re-applied on top of the fresh result.
    #[instrument(skip_all, fields(submission_id = %session.id()))]
    pub async fn parse(&self, session: &mut Session) -> Result<AggregateResult, ExitrackError> {
        session.ensure_open("parse")?;
        let started = Instant::now();

        let (plate, invoices) = {
            let (plate, invoices) = session.images_for_parse()?;
            info!(invoices = invoices.len(), engine = self.recognizer.name(), "Parse started");
            recognize_all(self.recognizer.as_ref(), plate, invoices, self.ocr_timeout).await
        };

        let mut result = self.engine.fuse(&plate, &invoices);
        result.source = self.source;
        result.processing_time_ms = started.elapsed().as_millis() as u64;
        self.engine.apply_overrides(&mut result, session.overrides());

        info!(
            vehicle = %result.vehicle_number,
            invoices = result.invoice_numbers.len(),
            needs_fallback = result.needs_fallback,
            elapsed_ms = result.processing_time_ms,
            "Parse complete"
        );
        session.set_result(result.clone());
        Ok(result)
    }

    /// Accept a parsed session. The `Accepted` event is sent first, then the
    /// entry is appended to the local store, then the upload is spawned. The
    /// caller gets a receipt without waiting for the network.
    #[instrument(skip_all, fields(submission_id = %session.id()))]
    pub async fn submit(&self, session: &mut Session) -> Result<SubmitReceipt, ExitrackError> {
        session.ensure_open("submit")?;
        let result = session.result().cloned().ok_or_else(|| {
            ExitrackError::InvalidTransition("cannot submit before parse".to_string())
        })?;
        let (plate, invoices) = session.images_for_parse()?;
        let plate = plate.clone();
        let invoices = invoices.to_vec();

        let submission_id = session.id();
        let meta = SubmissionMeta {
            location: session.location().map(str::to_string),
            device_info: self.device_info.clone(),
            capture_time: session.capture_time(),
        };

        let _ = self.events.send(PipelineEvent::Accepted { submission_id });
        session.mark_submitted();
        info!("Submission accepted");

        let entry = SubmissionEntry::new(submission_id, result.clone(), meta.clone());
        if let Err(e) = self.store.append(&entry).await {
            error!(error = %format!("{e:#}"), "Failed to record submission locally");
        }

        let bundle = UploadBundle {
            submission_id,
            plate,
            invoices,
            extracted: result.clone(),
            meta,
        };
        let sync = SyncTask {
            uploader: self.uploader.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
            timeout: self.upload_timeout,
        }
        .spawn(bundle);

        Ok(SubmitReceipt {
            submission_id,
            result,
            sync,
        })
    }

    /// Replace the vehicle number with an operator-typed value.
    pub fn override_vehicle(&self, session: &mut Session, value: &str) -> Result<(), ExitrackError> {
        session.ensure_open("edit the vehicle number")?;
        session.overrides_mut().set_vehicle(value);
        self.reapply_overrides(session);
        Ok(())
    }

    /// Replace the whole invoice list.
    pub fn override_invoices<I, S>(&self, session: &mut Session, values: I) -> Result<(), ExitrackError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        session.ensure_open("edit the invoice numbers")?;
        session.overrides_mut().set_invoices(values);
        self.reapply_overrides(session);
        Ok(())
    }

    /// Comma-separated operator input, as typed into a single field.
    pub fn override_invoices_csv(&self, session: &mut Session, input: &str) -> Result<(), ExitrackError> {
        self.override_invoices(session, input.split(','))
    }

    /// Edit one invoice entry; an index past the end appends.
    pub fn override_invoice_at(
        &self,
        session: &mut Session,
        index: usize,
        value: &str,
    ) -> Result<(), ExitrackError> {
        let mut numbers: Vec<String> = match (session.overrides().invoices(), session.result()) {
            (Some(edited), _) => edited.to_vec(),
            (None, Some(result)) => result.invoice_numbers.clone(),
            (None, None) => Vec::new(),
        };
        if index < numbers.len() {
            numbers[index] = value.to_string();
        } else {
            numbers.push(value.to_string());
        }
        self.override_invoices(session, numbers)
    }

    pub async fn unsynced_count(&self) -> Result<usize, ExitrackError> {
        self.store
            .unsynced_count()
            .await
            .map_err(|e| ExitrackError::Storage(format!("{e:#}")))
    }

    pub async fn unsynced(&self) -> Result<Vec<SubmissionEntry>, ExitrackError> {
        self.store
            .unsynced()
            .await
            .map_err(|e| ExitrackError::Storage(format!("{e:#}")))
    }

    fn reapply_overrides(&self, session: &mut Session) {
        let overrides = session.overrides().clone();
        if let Some(result) = session.result_mut() {
            self.engine.apply_overrides(result, &overrides);
        }
    }
}

fn default_device_info() -> String {
    format!(
        "exitrack/{} | {}-{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use exitrack_core::{CapturedImage, ImageKind, RawRecognition, SyncOutcome, HUMAN_OVERRIDE_CONFIDENCE};
    use exitrack_fusion::FusionConfig;
    use exitrack_understanding::InvoiceExtractor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio_stream::StreamExt;

    /// Answers by the first image byte:
    /// 1 plate, 2-3 invoices, 4 error, 9 hangs past any timeout.
    struct Scripted {
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Recognizer for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(&self, image: &CapturedImage, _kind: ImageKind) -> Result<RawRecognition> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (text, confidence) = match image.data[0] {
                1 => ("ঢাকা মেট্রো গ ১১-১২৩৪", 91.0),
                2 => ("Invoice No: INV-DBBA/0325/3219", 70.0),
                3 => ("Ref No: B-7781\nBill No: B-7782", 60.0),
                4 => bail!("worker crashed"),
                _ => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    ("late", 100.0)
                }
            };
            Ok(RawRecognition::new(text, confidence))
        }
    }

    enum UploadMode {
        Accept,
        Fail,
        WaitFor(Arc<Notify>),
    }

    struct StubUploader {
        mode: UploadMode,
    }

    #[async_trait]
    impl Uploader for StubUploader {
        async fn upload(&self, _bundle: &UploadBundle) -> Result<()> {
            match &self.mode {
                UploadMode::Accept => Ok(()),
                UploadMode::Fail => bail!("network unreachable"),
                UploadMode::WaitFor(gate) => {
                    gate.notified().await;
                    Ok(())
                }
            }
        }
    }

    fn pipeline(recognizer: Arc<dyn Recognizer>, mode: UploadMode) -> Pipeline {
        let store = Arc::new(SubmissionStore::in_memory().unwrap());
        let engine = FusionEngine::new(FusionConfig::default(), InvoiceExtractor::default());
        Pipeline::new(recognizer, Arc::new(StubUploader { mode }), store, engine)
            .with_device_info("test-device")
    }

    fn session(plate: u8, invoices: &[u8]) -> Session {
        let mut session = Session::new();
        session.set_plate(CapturedImage::new(vec![plate])).unwrap();
        for byte in invoices {
            session.add_invoice(CapturedImage::new(vec![*byte])).unwrap();
        }
        session
    }

    #[tokio::test(start_paused = true)]
    async fn plate_timeout_with_two_of_three_invoices() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept);
        let mut session = session(9, &[2, 3, 4]);

        let result = pipeline.parse(&mut session).await.unwrap();

        assert_eq!(result.vehicle_number, "");
        assert_eq!(result.vehicle_confidence, 0.0);
        assert_eq!(result.invoice_numbers, vec!["INV-DBBA/0325/3219", "B-7781", "B-7782"]);
        // Single match boosted (0.7 * 1.1), two matches unchanged, failed image 0.
        let expected = (0.77 + 0.6 + 0.0) / 3.0;
        assert!((result.invoice_confidence - expected).abs() < 1e-5);
        assert!(result.needs_fallback);
        assert_eq!(session.result(), Some(&result));
    }

    #[tokio::test]
    async fn parse_without_invoices_is_user_blocking() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept);
        let mut session = session(1, &[]);
        let err = pipeline.parse(&mut session).await.unwrap_err();
        assert!(err.is_user_blocking());
    }

    #[tokio::test]
    async fn upload_failure_still_accepts_and_keeps_entry_unsynced() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Fail);
        let mut events = pipeline.subscribe();
        let mut session = session(1, &[2]);
        let id = session.id();

        pipeline.parse(&mut session).await.unwrap();
        let receipt = pipeline.submit(&mut session).await.unwrap();
        assert_eq!(receipt.submission_id, id);

        let outcome = receipt.sync.await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Failed(ref reason) if reason.contains("network unreachable")));

        let entries = pipeline.store().list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].submission_id, id);
        assert!(!entries[0].synced);
        assert_eq!(entries[0].meta.device_info, "test-device");
        assert_eq!(pipeline.unsynced_count().await.unwrap(), 1);

        assert_eq!(events.recv().await.unwrap(), PipelineEvent::Accepted { submission_id: id });
        assert!(matches!(events.recv().await.unwrap(), PipelineEvent::SyncFailed { .. }));
    }

    #[tokio::test]
    async fn accepted_precedes_sync_and_entry_is_written_first() {
        let gate = Arc::new(Notify::new());
        let pipeline = pipeline(Scripted::new(), UploadMode::WaitFor(gate.clone()));
        let mut stream = pipeline.event_stream();
        let mut session = session(1, &[2]);

        pipeline.parse(&mut session).await.unwrap();
        let receipt = pipeline.submit(&mut session).await.unwrap();

        // Upload still blocked: accepted, recorded, not yet synced.
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, PipelineEvent::Accepted { submission_id: receipt.submission_id });
        assert_eq!(pipeline.unsynced_count().await.unwrap(), 1);

        gate.notify_one();
        assert_eq!(receipt.sync.await.unwrap(), SyncOutcome::Synced);
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second, PipelineEvent::Synced { submission_id: receipt.submission_id });

        let entry = pipeline.store().get(receipt.submission_id).await.unwrap().unwrap();
        assert!(entry.synced);
        assert_eq!(pipeline.unsynced_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn submission_id_is_stable_and_submit_is_terminal() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept);
        let mut session = session(1, &[2]);
        let id = session.id();

        pipeline.parse(&mut session).await.unwrap();
        pipeline.parse(&mut session).await.unwrap();
        assert_eq!(session.id(), id);

        let receipt = pipeline.submit(&mut session).await.unwrap();
        assert_eq!(receipt.submission_id, id);
        receipt.sync.await.unwrap();

        assert!(matches!(
            pipeline.submit(&mut session).await,
            Err(ExitrackError::InvalidTransition(_))
        ));
        assert!(matches!(
            pipeline.parse(&mut session).await,
            Err(ExitrackError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn submit_before_parse_is_rejected() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept);
        let mut session = session(1, &[2]);
        assert!(matches!(
            pipeline.submit(&mut session).await,
            Err(ExitrackError::InvalidTransition(_))
        ));
        assert!(pipeline.store().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn overrides_survive_reparse() {
        let recognizer = Scripted::new();
        let pipeline = pipeline(recognizer.clone(), UploadMode::Accept);
        let mut session = session(1, &[2]);

        let first = pipeline.parse(&mut session).await.unwrap();
        assert_eq!(first.vehicle_number, "DHAKA METRO-GA 11-1234");

        pipeline
            .override_vehicle(&mut session, "DHAKA METRO-GA 11-9999")
            .unwrap();
        pipeline
            .override_invoices_csv(&mut session, "INV-A1, ,INV-B2")
            .unwrap();
        let edited = session.result().unwrap();
        assert_eq!(edited.vehicle_number, "DHAKA METRO-GA 11-9999");
        assert_eq!(edited.vehicle_confidence, HUMAN_OVERRIDE_CONFIDENCE);
        assert!(edited.vehicle_edited);
        assert!(!edited.needs_fallback);

        let second = pipeline.parse(&mut session).await.unwrap();
        assert_eq!(second.vehicle_number, "DHAKA METRO-GA 11-9999");
        assert_eq!(second.invoice_numbers, vec!["INV-A1", "INV-B2"]);
        assert!(second.invoices_edited);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn edit_before_parse_is_applied_by_parse() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept);
        let mut session = session(1, &[2]);
        pipeline
            .override_invoice_at(&mut session, 0, "INV-MANUAL")
            .unwrap();
        let result = pipeline.parse(&mut session).await.unwrap();
        assert_eq!(result.invoice_numbers, vec!["INV-MANUAL"]);
        assert_eq!(result.invoice_confidence, HUMAN_OVERRIDE_CONFIDENCE);
    }

    #[tokio::test]
    async fn edit_single_invoice_after_parse() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept);
        let mut session = session(1, &[3]);
        pipeline.parse(&mut session).await.unwrap();
        pipeline
            .override_invoice_at(&mut session, 1, "B-7790")
            .unwrap();
        assert_eq!(
            session.result().unwrap().invoice_numbers,
            vec!["B-7781", "B-7790"]
        );
    }

    #[tokio::test]
    async fn submitted_entry_carries_location_and_source() {
        let pipeline = pipeline(Scripted::new(), UploadMode::Accept).with_source(OcrSource::Local);
        let mut session = session(1, &[2]);
        session.set_location(23.810332, 90.412518);
        pipeline.parse(&mut session).await.unwrap();
        let receipt = pipeline.submit(&mut session).await.unwrap();
        receipt.sync.await.unwrap();

        let entry = pipeline.store().get(receipt.submission_id).await.unwrap().unwrap();
        assert_eq!(entry.meta.location.as_deref(), Some("23.810332, 90.412518"));
        assert_eq!(entry.meta.capture_time, session.capture_time());
        assert_eq!(entry.extracted_data.source, OcrSource::Local);
        assert!(entry.synced);
    }
}
