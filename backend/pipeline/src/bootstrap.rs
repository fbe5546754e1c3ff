//! Wires config, logging, store, endpoint client and recognizer into a
//! ready [`Pipeline`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use exitrack_config::{
    config_dir, config_file_path, load_and_prepare, resolve_log_dir, resolve_store_path,
    ExitrackConfig, RecognitionEngine,
};
use exitrack_core::{ExitrackError, OcrSource, Recognizer};
use exitrack_fusion::{FusionConfig, FusionEngine};
use exitrack_logging::init_logger;
use exitrack_remote::{EndpointClient, RemoteRecognizer};
use exitrack_store::SubmissionStore;
use exitrack_understanding::InvoiceExtractor;
use tracing::{info, warn};

use crate::pipeline::Pipeline;
use crate::serialized::SerializedRecognizer;

pub struct Runtime {
    pub config: ExitrackConfig,
    pub config_dir: PathBuf,
    pub pipeline: Pipeline,
}

/// Start with the remote recognizer. `config_path` defaults to
/// `<config_dir>/config.yaml`.
pub async fn bootstrap(config_path: Option<&Path>) -> Result<Runtime> {
    assemble(config_path, None).await
}

/// Start with an on-device recognizer available. It is only used when the
/// config selects the local engine, and runs one request at a time.
pub async fn bootstrap_with_local<R>(config_path: Option<&Path>, local: R) -> Result<Runtime>
where
    R: Recognizer + 'static,
{
    let local: Arc<dyn Recognizer> = Arc::new(SerializedRecognizer::new(local));
    assemble(config_path, Some(local)).await
}

async fn assemble(config_path: Option<&Path>, local: Option<Arc<dyn Recognizer>>) -> Result<Runtime> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path(&config_dir()),
    };
    let config_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(config_dir);

    let config = load_and_prepare(&config_path).await?;

    let log_dir = resolve_log_dir(&config, &config_dir);
    if !init_logger(&log_dir, config.log_level())? {
        warn!("Logger already initialized; keeping the existing subscriber");
    }

    let store_path = resolve_store_path(&config, &config_dir);
    let store = SubmissionStore::open(&store_path)
        .with_context(|| format!("Failed to open submission store at {}", store_path.display()))?
        .with_capacity(config.store_capacity());
    let store = Arc::new(store);

    let upload_timeout = Duration::from_secs(config.upload_timeout_secs());
    let client = EndpointClient::new(config.endpoint_url())?
        .with_request_timeout(Duration::from_secs(config.request_timeout_secs()))
        .with_upload_timeout(upload_timeout);
    if !client.is_configured() {
        warn!("No endpoint URL configured; submissions will stay unsynced");
    }
    let client = Arc::new(client);

    let engine = fusion_engine(&config)?;

    let (recognizer, source) = match (config.engine(), local) {
        (RecognitionEngine::Remote, _) => {
            let remote: Arc<dyn Recognizer> = Arc::new(RemoteRecognizer::new(client.clone()));
            (remote, OcrSource::Remote)
        }
        (RecognitionEngine::Local, Some(local)) => (local, OcrSource::Local),
        (RecognitionEngine::Local, None) => {
            return Err(ExitrackError::Config(
                "recognition.engine is \"local\" but no on-device recognizer was provided".to_string(),
            )
            .into());
        }
    };

    let pipeline = Pipeline::new(recognizer, client, store, engine)
        .with_source(source)
        .with_ocr_timeout(Duration::from_secs(config.request_timeout_secs()))
        .with_upload_timeout(upload_timeout);

    match pipeline.unsynced_count().await {
        Ok(0) => {}
        Ok(n) => warn!(unsynced = n, "Submissions recorded locally but never uploaded"),
        Err(e) => warn!(error = %e, "Could not count unsynced submissions"),
    }

    info!(
        config = %config_path.display(),
        engine = %config.engine(),
        threshold = config.threshold(),
        store = %store_path.display(),
        "Exitrack ready"
    );

    Ok(Runtime {
        config,
        config_dir,
        pipeline,
    })
}

/// Fusion settings for the selected engine.
pub fn fusion_engine(config: &ExitrackConfig) -> Result<FusionEngine> {
    let extractor = InvoiceExtractor::new()
        .with_extra_patterns(config.extra_invoice_patterns())
        .context("Invalid recognition.extraInvoicePatterns")?
        .with_min_len(config.min_invoice_length());
    let fusion = FusionConfig {
        threshold: config.threshold(),
        single_match_boost: config.single_match_boost(),
        enable_fallback: config.enable_fallback(),
    };
    Ok(FusionEngine::new(fusion, extractor))
}
