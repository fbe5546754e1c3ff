//! Structured logging for Exitrack.
//!
//! Console and rolling JSON file output, plus helpers that keep image
//! payloads and long recognizer text out of log lines.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::{preview, redact_payload};
