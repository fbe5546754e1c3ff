pub mod submissions;

pub use submissions::{SubmissionStore, DEFAULT_CAPACITY};
