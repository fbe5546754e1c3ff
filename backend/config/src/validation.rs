//! Config validation: range checks with field paths.

use crate::schema::ExitrackConfig;
use regex::Regex;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &ExitrackConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_endpoint(config, &mut report);
    validate_recognition(config, &mut report);
    validate_store(config, &mut report);
    report
}

fn validate_endpoint(config: &ExitrackConfig, report: &mut ValidationReport) {
    if config.endpoint_url().trim().is_empty() {
        report.warn(
            "endpoint.url",
            "No endpoint URL configured; remote recognition and upload are unavailable",
        );
    }
    let Some(endpoint) = &config.endpoint else { return };
    if endpoint.request_timeout_secs == Some(0) {
        report.error("endpoint.requestTimeoutSecs", "requestTimeoutSecs must be >= 1");
    }
    if endpoint.upload_timeout_secs == Some(0) {
        report.error("endpoint.uploadTimeoutSecs", "uploadTimeoutSecs must be >= 1");
    }
}

fn check_threshold(path: &str, value: Option<f32>, report: &mut ValidationReport) {
    if let Some(t) = value {
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            report.error(path, format!("Threshold {t} must be within [0, 1]"));
        }
    }
}

fn validate_recognition(config: &ExitrackConfig, report: &mut ValidationReport) {
    let Some(recognition) = &config.recognition else { return };

    check_threshold("recognition.remoteThreshold", recognition.remote_threshold, report);
    check_threshold("recognition.localThreshold", recognition.local_threshold, report);

    if let Some(boost) = recognition.single_match_boost {
        if !boost.is_finite() || boost < 1.0 {
            report.error(
                "recognition.singleMatchBoost",
                format!("singleMatchBoost {boost} must be a finite value >= 1"),
            );
        }
    }

    if recognition.min_invoice_length == Some(0) {
        report.warn(
            "recognition.minInvoiceLength",
            "minInvoiceLength 0 accepts every candidate, including OCR noise",
        );
    }

    for (i, pattern) in recognition.extra_invoice_patterns.iter().enumerate() {
        if let Err(e) = Regex::new(pattern) {
            report.error(
                format!("recognition.extraInvoicePatterns[{i}]"),
                format!("Pattern does not compile: {e}"),
            );
        }
    }
}

fn validate_store(config: &ExitrackConfig, report: &mut ValidationReport) {
    let Some(store) = &config.store else { return };
    if store.capacity == Some(0) {
        report.error("store.capacity", "capacity must be >= 1");
    }
}
