use crate::codeforces::CodeforcesApi;
use crate::config::SyncConfig;
use crate::models::Profile;
use crate::store::Store;
use crate::sync::{ContestReconciler, Result, SubmissionReconciler};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::time;

/// Successfully synchronized profile with the non-fatal problems met on the way.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub profile: Profile,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSyncError {
    pub handle: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<ProfileSyncError>,
}

pub struct ProfileSyncOrchestrator {
    api: Arc<dyn CodeforcesApi>,
    store: Arc<dyn Store>,
    config: SyncConfig,
}

impl ProfileSyncOrchestrator {
    pub fn new(api: Arc<dyn CodeforcesApi>, store: Arc<dyn Store>, config: SyncConfig) -> Self {
        Self { api, store, config }
    }

    /// Pull everything the upstream knows about one profile and merge it into the store.
    ///
    /// The profile row is written last, so an upstream failure before that point leaves
    /// the stored profile untouched.
    pub async fn sync_one(&self, profile: &Profile) -> Result<SyncOutcome> {
        let handle = profile.handle.as_str();
        tracing::info!("Start to synchronize {}", handle);

        let info = self.api.fetch_profile(handle).await?;
        let submissions = self.api.fetch_submissions(handle).await?;

        let mut reconciler = SubmissionReconciler::new(self.api.as_ref(), self.store.as_ref());
        let report = reconciler.reconcile(handle, &submissions).await?;
        let mut warnings = report.warnings;

        let history = self.api.fetch_rating_history(handle).await?;
        let contests = ContestReconciler::new(self.api.as_ref(), self.store.as_ref())
            .reconcile(handle, &history)
            .await;
        warnings.extend(contests.failures.into_iter().map(|failure| failure.message));

        let updated = Profile {
            current_rating: info.rating.unwrap_or(0),
            max_rating: info.max_rating.unwrap_or(0),
            rank_tier: info.rank.unwrap_or_else(|| String::from("unrated")),
            total_solved: report.solved.len() as i32,
            last_submission_time: report.last_submission_time.or(profile.last_submission_time),
            last_sync_time: Some(Utc::now()),
            ..profile.clone()
        };
        self.store.update_profile_stats(&updated).await?;

        tracing::info!(
            "{} synchronized: rating {}, {} problems solved, {} warnings",
            handle,
            updated.current_rating,
            updated.total_solved,
            warnings.len()
        );

        Ok(SyncOutcome {
            profile: updated,
            warnings,
        })
    }

    /// Synchronize profiles in fixed-width concurrent batches with a pause between batches.
    pub async fn sync_all(&self, profiles: Vec<Profile>) -> SyncSummary {
        let mut summary = SyncSummary::default();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = (profiles.len() + batch_size - 1) / batch_size;

        for (i, batch) in profiles.chunks(batch_size).enumerate() {
            tracing::info!("Synchronize batch {}/{}", i + 1, total_batches);
            let results = join_all(batch.iter().map(|profile| self.sync_one(profile))).await;

            for (profile, result) in batch.iter().zip(results) {
                match result {
                    Ok(_) => summary.succeeded += 1,
                    Err(e) => {
                        let message = format!("failed to synchronize {}: {}", profile.handle, e);
                        tracing::error!(message);
                        summary.failed += 1;
                        summary.errors.push(ProfileSyncError {
                            handle: profile.handle.clone(),
                            message,
                        });
                    }
                }
            }

            if i + 1 < total_batches {
                time::sleep(self.config.batch_pause).await;
            }
        }

        tracing::info!(
            "Synchronization finished: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }
}
