//! Config defaults: fills every section the operator left out.

use crate::schema::{EndpointConfig, ExitrackConfig, LoggingConfig, RecognitionConfig, StoreConfig};

/// Threshold for the remote recognizer.
pub const DEFAULT_REMOTE_THRESHOLD: f32 = 0.80;

/// Threshold for the resident local recognizer.
pub const DEFAULT_LOCAL_THRESHOLD: f32 = 0.85;

pub const DEFAULT_SINGLE_MATCH_BOOST: f32 = 1.1;

pub const DEFAULT_MIN_INVOICE_LENGTH: usize = 3;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Local store retention bound.
pub const DEFAULT_CAPACITY: usize = 50;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: ExitrackConfig) -> ExitrackConfig {
    let config = apply_endpoint_defaults(config);
    let config = apply_recognition_defaults(config);
    let config = apply_store_defaults(config);
    apply_logging_defaults(config)
}

fn apply_endpoint_defaults(mut config: ExitrackConfig) -> ExitrackConfig {
    let endpoint = config.endpoint.get_or_insert_with(EndpointConfig::default);
    endpoint.url.get_or_insert_with(String::new);
    endpoint
        .request_timeout_secs
        .get_or_insert(DEFAULT_REQUEST_TIMEOUT_SECS);
    endpoint
        .upload_timeout_secs
        .get_or_insert(DEFAULT_UPLOAD_TIMEOUT_SECS);
    config
}

fn apply_recognition_defaults(mut config: ExitrackConfig) -> ExitrackConfig {
    let recognition = config
        .recognition
        .get_or_insert_with(RecognitionConfig::default);
    recognition.engine.get_or_insert_with(Default::default);
    recognition.remote_threshold.get_or_insert(DEFAULT_REMOTE_THRESHOLD);
    recognition.local_threshold.get_or_insert(DEFAULT_LOCAL_THRESHOLD);
    recognition.enable_fallback.get_or_insert(true);
    recognition
        .single_match_boost
        .get_or_insert(DEFAULT_SINGLE_MATCH_BOOST);
    recognition
        .min_invoice_length
        .get_or_insert(DEFAULT_MIN_INVOICE_LENGTH);
    config
}

/// Store path defaults to `submissions.db` beside the config file, which
/// the loader resolves; only the capacity is set here.
fn apply_store_defaults(mut config: ExitrackConfig) -> ExitrackConfig {
    let store = config.store.get_or_insert_with(StoreConfig::default);
    store.capacity.get_or_insert(DEFAULT_CAPACITY);
    config
}

fn apply_logging_defaults(mut config: ExitrackConfig) -> ExitrackConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.as_deref().map(str::trim).unwrap_or("").is_empty() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
