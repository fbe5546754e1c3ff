//! Exitrack runtime configuration schema.
//!
//! Every section is optional in the YAML file; `defaults::apply_all_defaults`
//! fills in what the operator left out.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::defaults::{
    DEFAULT_CAPACITY, DEFAULT_LOCAL_THRESHOLD, DEFAULT_LOG_LEVEL, DEFAULT_MIN_INVOICE_LENGTH,
    DEFAULT_REMOTE_THRESHOLD, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SINGLE_MATCH_BOOST,
    DEFAULT_UPLOAD_TIMEOUT_SECS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitrackConfig {
    /// Remote recognition / upload endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointConfig>,

    /// Recognizer selection and fusion tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition: Option<RecognitionConfig>,

    /// Local submission store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Bound on each OCR request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Bound on the background upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionEngine {
    #[default]
    Remote,
    Local,
}

impl fmt::Display for RecognitionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<RecognitionEngine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_match_boost: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_invoice_length: Option<usize>,
    /// Deployment patterns (tax registration, form series) run after the
    /// built-in invoice patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_invoice_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Store / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved accessors
// ---------------------------------------------------------------------------

impl ExitrackConfig {
    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_ref()
            .and_then(|e| e.url.as_deref())
            .unwrap_or("")
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.endpoint
            .as_ref()
            .and_then(|e| e.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn upload_timeout_secs(&self) -> u64 {
        self.endpoint
            .as_ref()
            .and_then(|e| e.upload_timeout_secs)
            .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS)
    }

    pub fn engine(&self) -> RecognitionEngine {
        self.recognition
            .as_ref()
            .and_then(|r| r.engine)
            .unwrap_or_default()
    }

    /// Fallback threshold for the configured engine.
    pub fn threshold(&self) -> f32 {
        let recognition = self.recognition.as_ref();
        match self.engine() {
            RecognitionEngine::Remote => recognition
                .and_then(|r| r.remote_threshold)
                .unwrap_or(DEFAULT_REMOTE_THRESHOLD),
            RecognitionEngine::Local => recognition
                .and_then(|r| r.local_threshold)
                .unwrap_or(DEFAULT_LOCAL_THRESHOLD),
        }
    }

    pub fn enable_fallback(&self) -> bool {
        self.recognition
            .as_ref()
            .and_then(|r| r.enable_fallback)
            .unwrap_or(true)
    }

    pub fn single_match_boost(&self) -> f32 {
        self.recognition
            .as_ref()
            .and_then(|r| r.single_match_boost)
            .unwrap_or(DEFAULT_SINGLE_MATCH_BOOST)
    }

    pub fn min_invoice_length(&self) -> usize {
        self.recognition
            .as_ref()
            .and_then(|r| r.min_invoice_length)
            .unwrap_or(DEFAULT_MIN_INVOICE_LENGTH)
    }

    pub fn extra_invoice_patterns(&self) -> &[String] {
        self.recognition
            .as_ref()
            .map(|r| r.extra_invoice_patterns.as_slice())
            .unwrap_or(&[])
    }

    pub fn store_path(&self) -> Option<&str> {
        self.store.as_ref().and_then(|s| s.path.as_deref())
    }

    pub fn store_capacity(&self) -> usize {
        self.store
            .as_ref()
            .and_then(|s| s.capacity)
            .unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.dir.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
endpoint:
  url: https://script.example.com/exec
  requestTimeoutSecs: 20
recognition:
  engine: local
  localThreshold: 0.9
  extraInvoicePatterns:
    - 'BIN[-:\s]*(\d{9,13})'
store:
  capacity: 10
"#;
        let cfg: ExitrackConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.endpoint_url(), "https://script.example.com/exec");
        assert_eq!(cfg.request_timeout_secs(), 20);
        assert_eq!(cfg.engine(), RecognitionEngine::Local);
        assert_eq!(cfg.threshold(), 0.9);
        assert_eq!(cfg.extra_invoice_patterns().len(), 1);
        assert_eq!(cfg.store_capacity(), 10);
    }

    #[test]
    fn threshold_follows_engine() {
        let mut cfg = ExitrackConfig::default();
        assert_eq!(cfg.threshold(), DEFAULT_REMOTE_THRESHOLD);
        cfg.recognition = Some(RecognitionConfig {
            engine: Some(RecognitionEngine::Local),
            ..Default::default()
        });
        assert_eq!(cfg.threshold(), DEFAULT_LOCAL_THRESHOLD);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: ExitrackConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, ExitrackConfig::default());
        assert!(cfg.enable_fallback());
        assert_eq!(cfg.upload_timeout_secs(), DEFAULT_UPLOAD_TIMEOUT_SECS);
        assert_eq!(cfg.log_level(), "info");
    }
}
