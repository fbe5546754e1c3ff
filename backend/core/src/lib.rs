pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::ExitrackError;
pub use event::{PipelineEvent, SyncOutcome};
pub use traits::{Recognizer, Uploader};
pub use types::{
    confidence_percent, format_location, push_unique, AggregateResult, CapturedImage,
    ConfidenceBadge, ImageKind, InvoiceRecord, OcrSource, PlateRecord, RawRecognition,
    RecognitionResult, SubmissionEntry, SubmissionMeta, UploadBundle, HUMAN_OVERRIDE_CONFIDENCE,
};
