//! Capture-to-record pipeline.
//!
//! A [`Session`] collects one plate image and N invoice images. [`Pipeline::parse`]
//! recognizes them concurrently and fuses the results; [`Pipeline::submit`]
//! signals acceptance immediately, records the entry locally, and syncs it to
//! the remote endpoint in the background.

pub mod bootstrap;
pub mod parse;
pub mod pipeline;
pub mod serialized;
pub mod session;
pub mod submit;

pub use bootstrap::{bootstrap, bootstrap_with_local, Runtime};
pub use parse::{recognize_all, recognize_one, DEFAULT_OCR_TIMEOUT};
pub use pipeline::Pipeline;
pub use serialized::SerializedRecognizer;
pub use session::{Session, SessionPhase};
pub use submit::{SubmitReceipt, DEFAULT_UPLOAD_TIMEOUT};
