//! Background half of the submit phase.

use std::sync::Arc;
use std::time::Duration;

use exitrack_core::{AggregateResult, PipelineEvent, SyncOutcome, UploadBundle, Uploader};
use exitrack_store::SubmissionStore;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Returned as soon as a submission is accepted. Dropping `sync` detaches the
/// upload; it still runs to completion.
#[derive(Debug)]
pub struct SubmitReceipt {
    pub submission_id: Uuid,
    pub result: AggregateResult,
    pub sync: JoinHandle<SyncOutcome>,
}

pub(crate) struct SyncTask {
    pub uploader: Arc<dyn Uploader>,
    pub store: Arc<SubmissionStore>,
    pub events: broadcast::Sender<PipelineEvent>,
    pub timeout: Duration,
}

impl SyncTask {
    pub fn spawn(self, bundle: UploadBundle) -> JoinHandle<SyncOutcome> {
        tokio::spawn(async move { self.run(bundle).await })
    }

    async fn run(self, bundle: UploadBundle) -> SyncOutcome {
        let submission_id = bundle.submission_id;
        let outcome = match tokio::time::timeout(self.timeout, self.uploader.upload(&bundle)).await {
            Ok(Ok(())) => self.confirm(submission_id).await,
            Ok(Err(e)) => SyncOutcome::Failed(format!("{e:#}")),
            Err(_) => SyncOutcome::Failed(format!(
                "upload timed out after {}s",
                self.timeout.as_secs()
            )),
        };

        let event = match &outcome {
            SyncOutcome::Synced => {
                info!(submission_id = %submission_id, "Submission synced");
                PipelineEvent::Synced { submission_id }
            }
            SyncOutcome::Failed(reason) => {
                warn!(submission_id = %submission_id, reason = %reason, "Submission left unsynced");
                PipelineEvent::SyncFailed {
                    submission_id,
                    reason: reason.clone(),
                }
            }
        };
        let _ = self.events.send(event);
        outcome
    }

    async fn confirm(&self, submission_id: Uuid) -> SyncOutcome {
        match self.store.mark_synced(submission_id).await {
            Ok(true) => SyncOutcome::Synced,
            Ok(false) => {
                warn!(submission_id = %submission_id, "Uploaded entry no longer in local store");
                SyncOutcome::Synced
            }
            Err(e) => {
                error!(submission_id = %submission_id, error = %e, "Uploaded but failed to mark synced");
                SyncOutcome::Failed(format!("uploaded but not marked synced: {e:#}"))
            }
        }
    }
}
