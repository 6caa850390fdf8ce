pub mod contest;
pub mod orchestrator;
pub mod submission;

use crate::codeforces::UpstreamError;
use crate::store::StoreError;
use thiserror::Error;

pub use contest::{ContestFailure, ContestReconciler, ContestReport};
pub use orchestrator::{ProfileSyncError, ProfileSyncOrchestrator, SyncOutcome, SyncSummary};
pub use submission::{SubmissionReconciler, SubmissionReport};

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure of one synchronization unit (a profile or a contest).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    UpstreamError(#[from] UpstreamError),
    #[error(transparent)]
    StoreError(#[from] StoreError),
}
