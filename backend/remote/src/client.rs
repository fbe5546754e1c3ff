use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use exitrack_core::{CapturedImage, ExitrackError, ImageKind, UploadBundle, Uploader};
use exitrack_logging::redact_payload;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::protocol::{EndpointResponse, FastOcrData, FastOcrRequest, UploadRequest};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the single-entrypoint remote endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    client: Client,
    url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl EndpointClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    async fn post<B, T>(&self, action: &str, body: &B, timeout: Duration) -> Result<EndpointResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !self.is_configured() {
            bail!("Remote endpoint URL is not configured");
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(payload) = serde_json::to_string(body) {
                debug!(action, payload = %redact_payload(&payload), "POST to endpoint");
            }
        }

        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .with_context(|| format!("{action} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExitrackError::Remote {
                status: i64::from(status.as_u16()),
                message,
            }
            .into());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {action} response"))
    }

    /// Run the `fastOCR` action for one image. A 200 with no `data` is an
    /// empty, zero-confidence result.
    pub async fn fast_ocr(&self, image: &CapturedImage, kind: ImageKind) -> Result<FastOcrData> {
        debug!(kind = %kind, bytes = image.data.len(), "Sending fastOCR request");
        let request = FastOcrRequest::new(image, kind);
        let response: EndpointResponse<FastOcrData> =
            self.post("fastOCR", &request, self.request_timeout).await?;
        let data = response.into_result()?.unwrap_or_default();
        debug!(kind = %kind, confidence = data.confidence, "fastOCR result received");
        Ok(data)
    }
}

#[async_trait]
impl Uploader for EndpointClient {
    async fn upload(&self, bundle: &UploadBundle) -> Result<()> {
        info!(
            submission_id = %bundle.submission_id,
            invoices = bundle.invoices.len(),
            "Uploading submission"
        );
        let request = UploadRequest::from(bundle);
        let response: EndpointResponse<serde_json::Value> =
            self.post("upload", &request, self.upload_timeout).await?;
        if let Err(e) = response.into_result() {
            warn!(submission_id = %bundle.submission_id, error = %e, "Upload rejected");
            return Err(e.into());
        }
        info!(submission_id = %bundle.submission_id, "Upload confirmed");
        Ok(())
    }
}
