use crate::codeforces::{model::RatingChangeEvent, CodeforcesApi};
use crate::store::Store;
use crate::sync::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContestFailure {
    pub contest_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestReport {
    pub applied: usize,
    pub failures: Vec<ContestFailure>,
}

/// Writes rating-change outcomes onto the contest table and onto every submission
/// of the handle in that contest.
pub struct ContestReconciler<'a> {
    api: &'a dyn CodeforcesApi,
    store: &'a dyn Store,
}

impl<'a> ContestReconciler<'a> {
    pub fn new(api: &'a dyn CodeforcesApi, store: &'a dyn Store) -> Self {
        Self { api, store }
    }

    pub async fn reconcile(&self, handle: &str, events: &[RatingChangeEvent]) -> ContestReport {
        let mut report = ContestReport::default();

        for event in events {
            match self.reconcile_one(handle, event).await {
                Ok(updated) => {
                    tracing::debug!(
                        "contest {} applied to {} submissions of {}",
                        event.contest_id,
                        updated,
                        handle
                    );
                    report.applied += 1;
                }
                Err(e) => {
                    let message = format!("failed to reconcile contest {} of {}: {}", event.contest_id, handle, e);
                    tracing::warn!(message);
                    report.failures.push(ContestFailure {
                        contest_id: event.contest_id,
                        message,
                    });
                }
            }
        }

        report
    }

    async fn reconcile_one(&self, handle: &str, event: &RatingChangeEvent) -> Result<u64> {
        let known_total = self
            .store
            .find_contest(event.contest_id)
            .await?
            .and_then(|contest| contest.total_problems);

        let total_problems = match known_total {
            Some(total) => total,
            None => {
                self.api
                    .fetch_contest_standings(event.contest_id, handle)
                    .await?
                    .problem_count
            }
        };

        self.store.upsert_contest(&event.to_contest(total_problems)).await?;
        let updated = self
            .store
            .apply_contest_result(handle, &event.to_result(total_problems))
            .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::Contest;
    use crate::store::MemoryStore;
    use crate::testing::{rating_event, submission, FakeApi};

    #[tokio::test]
    async fn test_failed_contest_does_not_stop_others() {
        let api = FakeApi::new();
        api.add_standings(1000, 6);
        api.add_standings(1002, 7);
        let store = MemoryStore::new();
        store.upsert_submission(&submission(1, "alice", 1000, "A", "OK", 100)).await.unwrap();
        store.upsert_submission(&submission(2, "alice", 1001, "A", "OK", 200)).await.unwrap();
        store.upsert_submission(&submission(3, "alice", 1002, "A", "OK", 300)).await.unwrap();

        let events = vec![
            rating_event(1000, "Round 1000 (Div. 2)", 1500, 1550, 10, 1000),
            rating_event(1001, "Round 1001 (Div. 2)", 1550, 1520, 20, 2000),
            rating_event(1002, "Educational Round 1002", 1520, 1600, 30, 3000),
        ];
        let report = ContestReconciler::new(&api, &store).reconcile("alice", &events).await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].contest_id, 1001);
        assert_eq!(store.find_submission(1).await.unwrap().unwrap().rating_change, Some(50));
        assert_eq!(store.find_submission(2).await.unwrap().unwrap().rating_change, None);
        assert_eq!(store.find_submission(3).await.unwrap().unwrap().rating_change, Some(80));

        let first = store.find_contest(1000).await.unwrap().unwrap();
        assert_eq!(first.kind.as_deref(), Some("CF"));
        let third = store.find_contest(1002).await.unwrap().unwrap();
        assert_eq!(third.kind.as_deref(), Some("Other"));
        assert_eq!(third.total_problems, Some(7));
    }

    #[tokio::test]
    async fn test_known_total_skips_standings() {
        let api = FakeApi::new();
        let store = MemoryStore::new();
        store
            .upsert_contest(&Contest {
                contest_id: 1000,
                name: String::from("Round 1000 (Div. 2)"),
                kind: Some(String::from("CF")),
                phase: Some(String::from("FINISHED")),
                start_time_seconds: Some(900),
                duration_seconds: Some(7200),
                total_problems: Some(5),
            })
            .await
            .unwrap();
        store.upsert_submission(&submission(1, "alice", 1000, "A", "OK", 100)).await.unwrap();

        let events = vec![rating_event(1000, "Round 1000 (Div. 2)", 1500, 1450, 99, 9000)];
        let reconciler = ContestReconciler::new(&api, &store);
        reconciler.reconcile("alice", &events).await;
        let once = store.snapshot().await;
        reconciler.reconcile("alice", &events).await;

        assert_eq!(api.calls("contest.standings"), 0);
        assert_eq!(once, store.snapshot().await);
        let stored = store.find_submission(1).await.unwrap().unwrap();
        assert_eq!(stored.rating_change, Some(-50));
        assert_eq!(stored.rank, Some(99));
        assert_eq!(stored.total_problems_in_contest, Some(5));
        assert_eq!(
            store.find_contest(1000).await.unwrap().unwrap().duration_seconds,
            Some(7200)
        );
    }
}
