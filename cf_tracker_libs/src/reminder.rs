use crate::config::ReminderConfig;
use crate::models::Profile;
use crate::store::{self, ReminderLog, Store};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::time;

/// Data handed to a [`Notifier`] for one inactive profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InactivityReminder {
    pub handle: String,
    pub name: String,
    pub email: Option<String>,
    pub current_rating: i32,
    pub max_rating: i32,
    pub total_solved: i32,
    pub inactive_days: i64,
}

impl InactivityReminder {
    fn from_profile(profile: &Profile, inactive_days: i64) -> Self {
        Self {
            handle: profile.handle.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            current_rating: profile.current_rating,
            max_rating: profile.max_rating,
            total_solved: profile.total_solved,
            inactive_days,
        }
    }
}

/// Delivery of reminder messages. Formatting and transport belong to the implementor.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_inactive(&self, reminder: &InactivityReminder) -> anyhow::Result<()>;
}

/// Notifier that only writes the reminder to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_inactive(&self, reminder: &InactivityReminder) -> anyhow::Result<()> {
        tracing::info!(
            handle = reminder.handle.as_str(),
            email = reminder.email.as_deref().unwrap_or("-"),
            "{} has no submission in the last {} days (rating {}, {} solved)",
            reminder.name,
            reminder.inactive_days,
            reminder.current_rating,
            reminder.total_solved
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InactivityReport {
    pub inactive: usize,
    pub notified: usize,
    pub failed: usize,
}

pub struct InactivityChecker {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
}

impl InactivityChecker {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: ReminderConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    fn is_inactive(&self, profile: &Profile, now: DateTime<Utc>) -> bool {
        let threshold = now - Duration::days(self.config.inactivity_days);
        profile.email_reminders_enabled
            && profile
                .last_submission_time
                .map_or(true, |last| last < threshold)
    }

    /// Notify every opted-in profile without a recent submission and log each attempt.
    pub async fn run(&self) -> store::Result<InactivityReport> {
        let now = Utc::now();
        let inactive: Vec<Profile> = self
            .store
            .list_profiles()
            .await?
            .into_iter()
            .filter(|profile| self.is_inactive(profile, now))
            .collect();

        let mut report = InactivityReport {
            inactive: inactive.len(),
            ..Default::default()
        };
        tracing::info!("Found {} inactive profiles", report.inactive);

        for (i, profile) in inactive.iter().enumerate() {
            let reminder = InactivityReminder::from_profile(profile, self.config.inactivity_days);
            let success = match self.notifier.notify_inactive(&reminder).await {
                Ok(()) => {
                    report.notified += 1;
                    true
                }
                Err(e) => {
                    tracing::error!("failed to notify {}: {:#}", profile.handle, e);
                    report.failed += 1;
                    false
                }
            };

            self.store
                .record_reminder(&ReminderLog {
                    handle: profile.handle.clone(),
                    sent_at: Utc::now(),
                    success,
                })
                .await?;

            if i + 1 < inactive.len() {
                time::sleep(self.config.delay).await;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_inactive(&self, reminder: &InactivityReminder) -> anyhow::Result<()> {
            if reminder.handle == "broken" {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent.lock().await.push(reminder.handle.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_inactive_opted_in_profiles_are_notified() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let mut active = Profile::new("active", "Active");
        active.last_submission_time = Some(now - Duration::days(1));
        let mut stale = Profile::new("stale", "Stale");
        stale.last_submission_time = Some(now - Duration::days(30));
        let never = Profile::new("never", "Never");
        let mut opted_out = Profile::new("opted-out", "Opted out");
        opted_out.email_reminders_enabled = false;
        let broken = Profile::new("broken", "Broken");
        for profile in [&active, &stale, &never, &opted_out, &broken] {
            store.save_profile(profile).await.unwrap();
        }

        let notifier = Arc::new(RecordingNotifier::default());
        let checker = InactivityChecker::new(store.clone(), notifier.clone(), ReminderConfig::default());
        let report = checker.run().await.unwrap();

        assert_eq!(
            report,
            InactivityReport {
                inactive: 3,
                notified: 2,
                failed: 1,
            }
        );
        let mut sent = notifier.sent.lock().await.clone();
        sent.sort();
        assert_eq!(sent, vec![String::from("never"), String::from("stale")]);
        assert_eq!(store.count_reminders("broken").await.unwrap(), 1);
        assert_eq!(store.count_reminders("active").await.unwrap(), 0);
        let logs = store.snapshot().await.reminders;
        assert!(logs.iter().any(|log| log.handle == "broken" && !log.success));
    }
}
