use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle, time};

pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Work executed by a job. The returned string is kept as the last result.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression `{expression}`: {message}")]
    InvalidCron { expression: String, message: String },
    #[error("job {0} has no registered action")]
    UnknownJob(JobKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    ProfileSync,
    InactivityCheck,
    CatalogUpdate,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            JobKind::ProfileSync => "profile-sync",
            JobKind::InactivityCheck => "inactivity-check",
            JobKind::CatalogUpdate => "catalog-update",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Stopped,
    Scheduled,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: JobKind,
    pub state: JobState,
    pub schedule: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
}

struct JobEntry {
    action: JobFn,
    expression: Option<String>,
    schedule: Option<Schedule>,
    timer: Option<JoinHandle<()>>,
    running: usize,
    last_run: Option<DateTime<Utc>>,
    last_result: Option<String>,
}

/// Parse a cron expression. Five-field expressions (`min hour dom mon dow`) get a leading
/// seconds field of `0`.
pub fn parse_cron(expression: &str) -> Result<Schedule> {
    let fields = expression.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {}", expression.trim())
    } else {
        expression.trim().to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// In-process cron timers for the recurring jobs. Nothing here is persisted.
///
/// Every run is spawned as its own task, so stopping or rescheduling a job only cancels
/// the timer and never an in-flight run.
#[derive(Clone, Default)]
pub struct SyncScheduler {
    jobs: Arc<Mutex<BTreeMap<JobKind, JobEntry>>>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, kind: JobKind, action: JobFn) {
        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.insert(
            kind,
            JobEntry {
                action,
                expression: None,
                schedule: None,
                timer: None,
                running: 0,
                last_run: None,
                last_result: None,
            },
        ) {
            if let Some(timer) = previous.timer {
                timer.abort();
            }
        }
    }

    pub async fn start(&self, kind: JobKind, expression: &str) -> Result<()> {
        let schedule = parse_cron(expression)?;

        let mut jobs = self.jobs.lock().await;
        let entry = jobs.get_mut(&kind).ok_or(ScheduleError::UnknownJob(kind))?;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        entry.timer = Some(tokio::spawn(run_timer(self.clone(), kind, schedule.clone())));
        entry.expression = Some(expression.to_string());
        entry.schedule = Some(schedule);

        tracing::info!("{} scheduled with `{}`", kind, expression);
        Ok(())
    }

    pub async fn stop(&self, kind: JobKind) {
        let mut jobs = self.jobs.lock().await;
        if let Some(timer) = jobs.get_mut(&kind).and_then(|entry| entry.timer.take()) {
            timer.abort();
            tracing::info!("{} stopped", kind);
        }
    }

    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.lock().await;
        for (kind, entry) in jobs.iter_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
                tracing::info!("{} stopped", kind);
            }
        }
    }

    /// Replace the schedule of a job. An invalid expression leaves the current timer as is.
    pub async fn update_schedule(&self, kind: JobKind, expression: &str) -> Result<()> {
        if let Err(e) = parse_cron(expression) {
            tracing::warn!("schedule of {} not updated: {}", kind, e);
            return Err(e);
        }
        self.start(kind, expression).await
    }

    /// Run a job immediately outside of its schedule and wait for it.
    pub async fn run_now(&self, kind: JobKind) -> Result<()> {
        if !self.jobs.lock().await.contains_key(&kind) {
            return Err(ScheduleError::UnknownJob(kind));
        }
        execute(self.clone(), kind).await;
        Ok(())
    }

    pub async fn status(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.iter()
            .map(|(kind, entry)| {
                let state = if entry.running > 0 {
                    JobState::Running
                } else if entry.timer.is_some() {
                    JobState::Scheduled
                } else {
                    JobState::Stopped
                };
                let next_run = match (&entry.timer, &entry.schedule) {
                    (Some(_), Some(schedule)) => schedule.upcoming(Utc).next(),
                    _ => None,
                };

                JobStatus {
                    job: *kind,
                    state,
                    schedule: entry.expression.clone(),
                    last_run: entry.last_run,
                    last_result: entry.last_result.clone(),
                    next_run,
                }
            })
            .collect()
    }
}

async fn run_timer(scheduler: SyncScheduler, kind: JobKind, schedule: Schedule) {
    let mut last_fire = Utc::now();
    loop {
        let next = match schedule.after(&last_fire.max(Utc::now())).next() {
            Some(next) => next,
            None => {
                tracing::warn!("schedule of {} has no upcoming run", kind);
                return;
            }
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        time::sleep(wait).await;
        last_fire = next;

        tokio::spawn(execute(scheduler.clone(), kind));
    }
}

async fn execute(scheduler: SyncScheduler, kind: JobKind) {
    let action = {
        let mut jobs = scheduler.jobs.lock().await;
        match jobs.get_mut(&kind) {
            Some(entry) => {
                entry.running += 1;
                entry.action.clone()
            }
            None => return,
        }
    };

    let started_at = Utc::now();
    tracing::info!("Start {}", kind);
    let result = match tokio::spawn(action()).await {
        Ok(Ok(message)) => {
            tracing::info!("{} finished: {}", kind, message);
            message
        }
        Ok(Err(e)) => {
            let message = format!("failed: {:#}", e);
            tracing::error!("{} {}", kind, message);
            message
        }
        Err(e) => {
            let message = format!("failed: {}", e);
            tracing::error!("{} {}", kind, message);
            message
        }
    };

    let mut jobs = scheduler.jobs.lock().await;
    if let Some(entry) = jobs.get_mut(&kind) {
        entry.running = entry.running.saturating_sub(1);
        entry.last_run = Some(started_at);
        entry.last_result = Some(result);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    fn counting_job(counter: Arc<AtomicUsize>) -> JobFn {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                let runs = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, anyhow::Error>(format!("run {}", runs))
            }
            .boxed()
        })
    }

    #[test]
    fn test_parse_cron_accepts_five_and_six_fields() {
        assert!(parse_cron("0 2 * * *").is_ok());
        assert!(parse_cron("30 0 2 * * *").is_ok());
        assert!(parse_cron("not a cron").is_err());
        assert!(parse_cron("99 2 * * *").is_err());
    }

    #[tokio::test]
    async fn test_panicking_job_is_not_left_running() {
        let scheduler = SyncScheduler::new();
        let action: JobFn = Arc::new(|| {
            async {
                if true {
                    panic!("job exploded");
                }
                Ok::<_, anyhow::Error>(String::new())
            }
            .boxed()
        });
        scheduler.register(JobKind::CatalogUpdate, action).await;

        scheduler.run_now(JobKind::CatalogUpdate).await.unwrap();

        let status = scheduler.status().await;
        assert_eq!(status[0].state, JobState::Stopped);
        assert!(status[0].last_result.as_deref().unwrap().starts_with("failed"));
        assert!(status[0].last_run.is_some());
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_previous_schedule() {
        let scheduler = SyncScheduler::new();
        scheduler
            .register(JobKind::ProfileSync, counting_job(Arc::new(AtomicUsize::new(0))))
            .await;
        scheduler.start(JobKind::ProfileSync, "0 2 * * *").await.unwrap();

        let result = scheduler.update_schedule(JobKind::ProfileSync, "every day").await;

        assert!(matches!(result, Err(ScheduleError::InvalidCron { .. })));
        let status = scheduler.status().await;
        assert_eq!(status[0].state, JobState::Scheduled);
        assert_eq!(status[0].schedule.as_deref(), Some("0 2 * * *"));
        assert!(status[0].next_run.is_some());
        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_and_unknown_job() {
        let scheduler = SyncScheduler::new();
        scheduler
            .register(JobKind::CatalogUpdate, counting_job(Arc::new(AtomicUsize::new(0))))
            .await;
        scheduler.start(JobKind::CatalogUpdate, "0 4 * * *").await.unwrap();
        scheduler.stop(JobKind::CatalogUpdate).await;

        let status = scheduler.status().await;
        assert_eq!(status[0].state, JobState::Stopped);
        assert_eq!(status[0].next_run, None);
        assert!(matches!(
            scheduler.start(JobKind::InactivityCheck, "0 3 * * *").await,
            Err(ScheduleError::UnknownJob(JobKind::InactivityCheck))
        ));
    }

    #[tokio::test]
    async fn test_run_now_records_result() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = SyncScheduler::new();
        scheduler.register(JobKind::InactivityCheck, counting_job(counter.clone())).await;

        scheduler.run_now(JobKind::InactivityCheck).await.unwrap();

        let status = scheduler.status().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(status[0].last_result.as_deref(), Some("run 1"));
        assert!(status[0].last_run.is_some());
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded() {
        let scheduler = SyncScheduler::new();
        let action: JobFn = Arc::new(|| async { Err::<String, _>(anyhow::anyhow!("upstream down")) }.boxed());
        scheduler.register(JobKind::ProfileSync, action).await;

        scheduler.run_now(JobKind::ProfileSync).await.unwrap();

        let status = scheduler.status().await;
        assert_eq!(status[0].last_result.as_deref(), Some("failed: upstream down"));
    }

    #[tokio::test]
    async fn test_timer_fires_job() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = SyncScheduler::new();
        scheduler.register(JobKind::ProfileSync, counting_job(counter.clone())).await;
        scheduler.start(JobKind::ProfileSync, "* * * * * *").await.unwrap();

        time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop_all().await;

        assert!(counter.load(Ordering::SeqCst) >= 1);
    }
}
