//! Text understanding for plate and invoice photos: the deterministic
//! normalization and extraction that turn recognizer output into fields.

pub mod invoice;
pub mod plate;
pub mod tables;

pub use invoice::{InvoiceExtractor, InvoicePattern, DEFAULT_MIN_INVOICE_LEN};
pub use plate::{normalize_plate, plate_record};
