use thiserror::Error;

/// Top-level error type for the Exitrack runtime.
#[derive(Debug, Error)]
pub enum ExitrackError {
    /// Parse was invoked without a plate image and at least one invoice image.
    #[error("missing required images: {0}")]
    MissingImages(String),

    #[error("invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("recognition failed ({kind}): {message}")]
    Recognition { kind: String, message: String },

    #[error("remote endpoint returned status {status}: {message}")]
    Remote { status: i64, message: String },

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExitrackError {
    /// True for the one failure the operator has to fix before parsing.
    pub fn is_user_blocking(&self) -> bool {
        matches!(self, Self::MissingImages(_))
    }
}
