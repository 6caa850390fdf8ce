pub mod memory;
pub mod postgres;

use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database operation failed: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("failed to run migrations: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("profile {0} does not exist")]
    ProfileNotFound(String),
    #[error("{0}")]
    UnexpectedError(String),
}

/// One notification attempt of the inactivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderLog {
    pub handle: String,
    pub sent_at: DateTime<Utc>,
    pub success: bool,
}

/// Persistence gateway of the engine.
///
/// Records are addressed by their natural keys and written with upserts, so that
/// repeated full re-fetches of the upstream converge to the same state.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_profiles(&self) -> Result<Vec<Profile>>;
    async fn find_profile(&self, handle: &str) -> Result<Option<Profile>>;
    /// Insert or fully replace a profile.
    async fn save_profile(&self, profile: &Profile) -> Result<()>;
    /// Overwrite only the fields owned by synchronization.
    async fn update_profile_stats(&self, profile: &Profile) -> Result<()>;

    /// Upsert by `submission_id` with the merge rules of [`Submission::merged_into`].
    async fn upsert_submission(&self, submission: &Submission) -> Result<()>;
    async fn find_submission(&self, submission_id: i64) -> Result<Option<Submission>>;
    /// Overwrite the contest-filled fields of every submission of `(handle, contest_id)`.
    async fn apply_contest_result(&self, handle: &str, result: &ContestResult) -> Result<u64>;
    async fn rated_contests(&self, handle: &str) -> Result<Vec<RatedContest>>;

    async fn find_contest(&self, contest_id: i64) -> Result<Option<Contest>>;
    /// Upsert by `contest_id` with the merge rules of [`Contest::merged_into`].
    async fn upsert_contest(&self, contest: &Contest) -> Result<()>;

    async fn find_problem(&self, key: &ProblemKey) -> Result<Option<Problem>>;
    async fn upsert_problem(&self, problem: &Problem) -> Result<()>;
    async fn list_problem_keys(&self) -> Result<Vec<ProblemKey>>;
    async fn delete_problem(&self, key: &ProblemKey) -> Result<()>;
    /// Distinct accepted problems, most submitted first.
    async fn accepted_problem_counts(&self) -> Result<Vec<SolvedProblemCount>>;

    async fn record_reminder(&self, log: &ReminderLog) -> Result<()>;
    async fn count_reminders(&self, handle: &str) -> Result<i64>;
}
