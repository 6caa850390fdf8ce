use crate::models::*;
use crate::store::{ReminderLog, Result, Store, StoreError};
use async_trait::async_trait;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Full content of a [`MemoryStore`], ordered by natural keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub profiles: BTreeMap<String, Profile>,
    pub submissions: BTreeMap<i64, Submission>,
    pub contests: BTreeMap<i64, Contest>,
    pub problems: BTreeMap<ProblemKey, Problem>,
    pub reminders: Vec<ReminderLog>,
}

/// In-process store for development runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemorySnapshot>,
    rejected_handles: RwLock<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        self.data.read().await.clone()
    }

    /// Make every submission write of `handle` fail, simulating a persistence outage.
    pub async fn reject_writes_for(&self, handle: &str) {
        self.rejected_handles.write().await.insert(handle.to_string());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.data.read().await.profiles.values().cloned().collect())
    }

    async fn find_profile(&self, handle: &str) -> Result<Option<Profile>> {
        Ok(self.data.read().await.profiles.get(handle).cloned())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.data
            .write()
            .await
            .profiles
            .insert(profile.handle.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile_stats(&self, profile: &Profile) -> Result<()> {
        let mut data = self.data.write().await;
        let stored = data
            .profiles
            .get_mut(&profile.handle)
            .ok_or_else(|| StoreError::ProfileNotFound(profile.handle.clone()))?;

        stored.current_rating = profile.current_rating;
        stored.max_rating = profile.max_rating;
        stored.rank_tier = profile.rank_tier.clone();
        stored.total_solved = profile.total_solved;
        stored.last_submission_time = profile.last_submission_time;
        stored.last_sync_time = profile.last_sync_time;
        Ok(())
    }

    async fn upsert_submission(&self, submission: &Submission) -> Result<()> {
        if self.rejected_handles.read().await.contains(&submission.handle) {
            return Err(StoreError::UnexpectedError(format!(
                "writes for {} are rejected",
                submission.handle
            )));
        }

        let mut data = self.data.write().await;
        let merged = match data.submissions.get(&submission.submission_id) {
            Some(stored) => submission.merged_into(stored),
            None => submission.clone(),
        };
        data.submissions.insert(submission.submission_id, merged);
        Ok(())
    }

    async fn find_submission(&self, submission_id: i64) -> Result<Option<Submission>> {
        Ok(self.data.read().await.submissions.get(&submission_id).cloned())
    }

    async fn apply_contest_result(&self, handle: &str, result: &ContestResult) -> Result<u64> {
        let mut data = self.data.write().await;
        let mut updated = 0;
        for submission in data
            .submissions
            .values_mut()
            .filter(|submission| submission.handle == handle && submission.contest_id == result.contest_id)
        {
            submission.apply_contest_result(result);
            updated += 1;
        }
        Ok(updated)
    }

    async fn rated_contests(&self, handle: &str) -> Result<Vec<RatedContest>> {
        let data = self.data.read().await;
        let mut rated: HashMap<i64, RatedContest> = HashMap::new();

        for submission in data
            .submissions
            .values()
            .filter(|submission| submission.handle == handle)
        {
            let rating_change = match submission.rating_change {
                Some(rating_change) => rating_change,
                None => continue,
            };
            let entry = rated.entry(submission.contest_id).or_insert_with(|| RatedContest {
                contest_id: submission.contest_id,
                contest_name: submission.contest_name.clone().unwrap_or_default(),
                rating_change,
                rank: submission.rank,
                timestamp_seconds: submission.submitted_at_seconds,
            });
            entry.timestamp_seconds = entry.timestamp_seconds.min(submission.submitted_at_seconds);
        }

        for entry in rated.values_mut() {
            if let Some(start) = data
                .contests
                .get(&entry.contest_id)
                .and_then(|contest| contest.start_time_seconds)
            {
                entry.timestamp_seconds = start;
            }
        }

        Ok(rated
            .into_values()
            .sorted_by_key(|entry| (entry.timestamp_seconds, entry.contest_id))
            .collect())
    }

    async fn find_contest(&self, contest_id: i64) -> Result<Option<Contest>> {
        Ok(self.data.read().await.contests.get(&contest_id).cloned())
    }

    async fn upsert_contest(&self, contest: &Contest) -> Result<()> {
        let mut data = self.data.write().await;
        let merged = match data.contests.get(&contest.contest_id) {
            Some(stored) => contest.merged_into(stored),
            None => contest.clone(),
        };
        data.contests.insert(contest.contest_id, merged);
        Ok(())
    }

    async fn find_problem(&self, key: &ProblemKey) -> Result<Option<Problem>> {
        Ok(self.data.read().await.problems.get(key).cloned())
    }

    async fn upsert_problem(&self, problem: &Problem) -> Result<()> {
        self.data
            .write()
            .await
            .problems
            .insert(problem.key(), problem.clone());
        Ok(())
    }

    async fn list_problem_keys(&self) -> Result<Vec<ProblemKey>> {
        Ok(self.data.read().await.problems.keys().cloned().collect())
    }

    async fn delete_problem(&self, key: &ProblemKey) -> Result<()> {
        self.data.write().await.problems.remove(key);
        Ok(())
    }

    async fn accepted_problem_counts(&self) -> Result<Vec<SolvedProblemCount>> {
        let data = self.data.read().await;
        let counts = data
            .submissions
            .values()
            .filter(|submission| submission.verdict.is_accepted())
            .map(|submission| submission.problem_key())
            .counts();

        Ok(counts
            .into_iter()
            .map(|(key, count)| SolvedProblemCount {
                key,
                accepted_count: count as i64,
            })
            .sorted_by(|a, b| {
                b.accepted_count
                    .cmp(&a.accepted_count)
                    .then_with(|| a.key.cmp(&b.key))
            })
            .collect())
    }

    async fn record_reminder(&self, log: &ReminderLog) -> Result<()> {
        self.data.write().await.reminders.push(log.clone());
        Ok(())
    }

    async fn count_reminders(&self, handle: &str) -> Result<i64> {
        Ok(self
            .data
            .read()
            .await
            .reminders
            .iter()
            .filter(|log| log.handle == handle)
            .count() as i64)
    }
}
