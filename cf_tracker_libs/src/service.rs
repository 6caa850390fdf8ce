use crate::catalog::{CatalogReport, ProblemCatalogUpdater};
use crate::codeforces::CodeforcesApi;
use crate::config::{Config, ScheduleConfig};
use crate::models::Profile;
use crate::rating::{rating_progression, RatingProgression, RatingWindow};
use crate::reminder::{InactivityChecker, InactivityReport, Notifier};
use crate::scheduler::{parse_cron, JobFn, JobKind, JobStatus, ScheduleError, SyncScheduler};
use crate::store::{Store, StoreError};
use crate::sync::{ProfileSyncOrchestrator, SyncError, SyncOutcome, SyncSummary};
use crate::worker::{BackgroundWorker, WorkerError};
use anyhow::Context;
use chrono::Utc;
use futures::{future::BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Instant;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("profile {0} is not tracked")]
    ProfileNotFound(String),
    #[error(transparent)]
    StoreError(#[from] StoreError),
    #[error(transparent)]
    SyncError(#[from] SyncError),
    #[error(transparent)]
    ScheduleError(#[from] ScheduleError),
    #[error(transparent)]
    WorkerError(#[from] WorkerError),
}

/// Outcome of one stage of a forced synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Requested schedule changes. Absent fields keep the current schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub sync_cron: Option<String>,
    pub inactivity_cron: Option<String>,
    pub catalog_cron: Option<String>,
}

impl ScheduleUpdate {
    fn entries(&self) -> Vec<(JobKind, &str)> {
        [
            (JobKind::ProfileSync, &self.sync_cron),
            (JobKind::InactivityCheck, &self.inactivity_cron),
            (JobKind::CatalogUpdate, &self.catalog_cron),
        ]
        .into_iter()
        .filter_map(|(kind, expression)| expression.as_deref().map(|expression| (kind, expression)))
        .collect()
    }
}

/// Process-wide entry point of the engine: manual triggers, scheduled jobs and read models.
pub struct SyncService {
    api: Arc<dyn CodeforcesApi>,
    store: Arc<dyn Store>,
    orchestrator: ProfileSyncOrchestrator,
    catalog: ProblemCatalogUpdater,
    reminders: InactivityChecker,
    scheduler: SyncScheduler,
    worker: BackgroundWorker,
    schedule: ScheduleConfig,
}

impl SyncService {
    pub fn new(
        api: Arc<dyn CodeforcesApi>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            orchestrator: ProfileSyncOrchestrator::new(api.clone(), store.clone(), config.sync.clone()),
            catalog: ProblemCatalogUpdater::new(api.clone(), store.clone()),
            reminders: InactivityChecker::new(store.clone(), notifier, config.reminder.clone()),
            scheduler: SyncScheduler::new(),
            worker: BackgroundWorker::spawn(config.worker_queue_size),
            schedule: config.schedule.clone(),
            api,
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Register a handle for tracking. An already tracked handle is left as is.
    pub async fn track(&self, handle: &str, name: &str, email: Option<String>) -> Result<Profile> {
        if let Some(profile) = self.store.find_profile(handle).await? {
            tracing::info!("{} is already tracked", handle);
            return Ok(profile);
        }

        let profile = Profile {
            email,
            ..Profile::new(handle, name)
        };
        self.store.save_profile(&profile).await?;
        tracing::info!("Start tracking {}", handle);
        Ok(profile)
    }

    /// Upsert every contest of the upstream contest list.
    pub async fn sync_contests(&self) -> std::result::Result<usize, SyncError> {
        let contests = self.api.fetch_contest_list().await?;
        for summary in contests.iter() {
            self.store.upsert_contest(&summary.to_contest()).await?;
        }
        tracing::info!("{} contests synchronized", contests.len());
        Ok(contests.len())
    }

    pub async fn sync_profile(&self, handle: &str) -> Result<SyncOutcome> {
        let profile = self
            .store
            .find_profile(handle)
            .await?
            .ok_or_else(|| ServiceError::ProfileNotFound(handle.to_string()))?;
        Ok(self.orchestrator.sync_one(&profile).await?)
    }

    pub async fn sync_all_profiles(&self) -> Result<SyncSummary> {
        let profiles = self.store.list_profiles().await?;
        Ok(self.orchestrator.sync_all(profiles).await)
    }

    pub async fn update_catalog(&self) -> Result<CatalogReport> {
        Ok(self.catalog.update().await?)
    }

    pub async fn cleanup_catalog(&self) -> Result<usize> {
        Ok(self.catalog.cleanup_invalid().await?)
    }

    pub async fn check_inactivity(&self) -> Result<InactivityReport> {
        Ok(self.reminders.run().await?)
    }

    /// Run contest, profile and catalog synchronization in order, one report per stage.
    ///
    /// A failed stage does not prevent the next ones.
    pub async fn force_sync(&self) -> Vec<StageReport> {
        let mut stages = Vec::new();

        stages.push(
            run_stage("contests", async {
                let count = self.sync_contests().await?;
                Ok::<_, anyhow::Error>(format!("{} contests synchronized", count))
            })
            .await,
        );
        stages.push(
            run_stage("profiles", async {
                let summary = self.sync_all_profiles().await?;
                if summary.failed > 0 && summary.succeeded == 0 {
                    anyhow::bail!("all {} profiles failed to synchronize", summary.failed);
                }
                Ok::<_, anyhow::Error>(format!(
                    "{} profiles synchronized, {} failed",
                    summary.succeeded, summary.failed
                ))
            })
            .await,
        );
        stages.push(
            run_stage("catalog", async {
                let report = self.update_catalog().await?;
                Ok::<_, anyhow::Error>(format!(
                    "{} problems updated, {} not found, {} errors, {} skipped",
                    report.updated, report.not_found, report.errors, report.skipped
                ))
            })
            .await,
        );

        stages
    }

    /// Hand a full synchronization to the background worker and return immediately.
    pub fn trigger_sync(self: &Arc<Self>) -> Result<()> {
        let service = self.clone();
        self.worker.submit(
            "manual-sync",
            async move {
                let stages = service.force_sync().await;
                let failed = stages.iter().filter(|stage| !stage.success).count();
                Ok::<_, anyhow::Error>(format!("{} stages run, {} failed", stages.len(), failed))
            }
            .boxed(),
        )?;
        Ok(())
    }

    pub async fn rating_progression(&self, handle: &str, days: Option<i64>) -> Result<RatingProgression> {
        let profile = self
            .store
            .find_profile(handle)
            .await?
            .ok_or_else(|| ServiceError::ProfileNotFound(handle.to_string()))?;
        let history = self.store.rated_contests(handle).await?;
        let window = days.map_or(RatingWindow::all(), |days| RatingWindow::last_days(days, Utc::now()));

        Ok(rating_progression(profile.current_rating, &history, window))
    }

    /// Number of inactivity reminders sent to a tracked handle.
    pub async fn count_reminders(&self, handle: &str) -> Result<i64> {
        if self.store.find_profile(handle).await?.is_none() {
            return Err(ServiceError::ProfileNotFound(handle.to_string()));
        }
        Ok(self.store.count_reminders(handle).await?)
    }

    /// Register the recurring jobs and start them with the configured schedules.
    pub async fn start_scheduler(self: &Arc<Self>) -> Result<()> {
        let weak = Arc::downgrade(self);
        self.scheduler
            .register(
                JobKind::ProfileSync,
                job(weak.clone(), |service| async move {
                    let contests = match service.sync_contests().await {
                        Ok(count) => format!("{} contests synchronized", count),
                        Err(e) => {
                            tracing::error!("contest list not synchronized, continuing with profiles: {}", e);
                            format!("contest list failed: {}", e)
                        }
                    };
                    let summary = service
                        .sync_all_profiles()
                        .await
                        .context("failed to synchronize profiles")?;
                    Ok::<_, anyhow::Error>(format!(
                        "{}; {} profiles synchronized, {} failed",
                        contests, summary.succeeded, summary.failed
                    ))
                }),
            )
            .await;
        self.scheduler
            .register(
                JobKind::InactivityCheck,
                job(weak.clone(), |service| async move {
                    let report = service.check_inactivity().await?;
                    Ok::<_, anyhow::Error>(format!(
                        "{} inactive, {} notified, {} failed",
                        report.inactive, report.notified, report.failed
                    ))
                }),
            )
            .await;
        self.scheduler
            .register(
                JobKind::CatalogUpdate,
                job(weak, |service| async move {
                    let report = service.update_catalog().await?;
                    Ok::<_, anyhow::Error>(format!("{} of {} problems updated", report.updated, report.total))
                }),
            )
            .await;

        self.scheduler.start(JobKind::ProfileSync, &self.schedule.sync_cron).await?;
        self.scheduler
            .start(JobKind::InactivityCheck, &self.schedule.inactivity_cron)
            .await?;
        self.scheduler
            .start(JobKind::CatalogUpdate, &self.schedule.catalog_cron)
            .await?;
        Ok(())
    }

    /// Apply schedule changes. Every expression is validated before any job is touched.
    pub async fn update_schedule(&self, update: &ScheduleUpdate) -> Result<()> {
        let entries = update.entries();
        for (_, expression) in entries.iter() {
            parse_cron(expression)?;
        }
        for (kind, expression) in entries {
            self.scheduler.update_schedule(kind, expression).await?;
        }
        Ok(())
    }

    pub async fn stop_scheduler(&self) {
        self.scheduler.stop_all().await;
    }

    pub async fn status(&self) -> Vec<JobStatus> {
        self.scheduler.status().await
    }
}

fn job<F, Fut>(service: Weak<SyncService>, run: F) -> JobFn
where
    F: Fn(Arc<SyncService>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    let run = Arc::new(run);
    Arc::new(move || -> BoxFuture<'static, anyhow::Result<String>> {
        let service = service.upgrade();
        let run = run.clone();
        async move {
            match service {
                Some(service) => run(service).await,
                None => anyhow::bail!("service has been shut down"),
            }
        }
        .boxed()
    })
}

async fn run_stage<F>(stage: &str, work: F) -> StageReport
where
    F: Future<Output = anyhow::Result<String>>,
{
    let started = Instant::now();
    let (success, message) = match work.await {
        Ok(message) => (true, message),
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!("stage {} failed: {}", stage, message);
            (false, message)
        }
    };

    StageReport {
        stage: stage.to_string(),
        success,
        message,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
