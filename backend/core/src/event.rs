use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notifications emitted by the submission pipeline.
///
/// `Accepted` is the optimistic signal shown to the operator; it is always
/// sent before the local entry is written and before the upload starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PipelineEvent {
    Accepted { submission_id: Uuid },
    Synced { submission_id: Uuid },
    SyncFailed { submission_id: Uuid, reason: String },
}

impl PipelineEvent {
    pub fn submission_id(&self) -> Uuid {
        match self {
            Self::Accepted { submission_id }
            | Self::Synced { submission_id }
            | Self::SyncFailed { submission_id, .. } => *submission_id,
        }
    }
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted { submission_id } => write!(f, "accepted {submission_id}"),
            Self::Synced { submission_id } => write!(f, "synced {submission_id}"),
            Self::SyncFailed {
                submission_id,
                reason,
            } => write!(f, "sync failed {submission_id}: {reason}"),
        }
    }
}

/// How a background upload settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Failed(String),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}
