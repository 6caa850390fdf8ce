use crate::codeforces::CodeforcesApi;
use crate::models::{Problem, ProblemKey};
use crate::store::{self, Store};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    pub updated: usize,
    pub not_found: usize,
    pub errors: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Refreshes the problem catalog from the problems that have accepted submissions.
pub struct ProblemCatalogUpdater {
    api: Arc<dyn CodeforcesApi>,
    store: Arc<dyn Store>,
}

impl ProblemCatalogUpdater {
    pub fn new(api: Arc<dyn CodeforcesApi>, store: Arc<dyn Store>) -> Self {
        Self { api, store }
    }

    /// Fetch metadata of every solved problem, most submitted first.
    ///
    /// Problems with gym or malformed keys are skipped. A failure on one problem is counted
    /// and does not stop the others.
    pub async fn update(&self) -> store::Result<CatalogReport> {
        let counts = self.store.accepted_problem_counts().await?;
        let mut report = CatalogReport {
            total: counts.len(),
            ..Default::default()
        };
        tracing::info!("Start to update {} catalog entries", report.total);

        for count in counts {
            let key = count.key;
            if !key.is_problemset() {
                tracing::debug!("skip problem {} with an invalid key", key);
                report.skipped += 1;
                continue;
            }

            match self.refresh(&key).await {
                Ok(true) => report.updated += 1,
                Ok(false) => {
                    tracing::info!("problem {} is not listed upstream", key);
                    report.not_found += 1;
                }
                Err(message) => {
                    tracing::warn!(message);
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            "Catalog update finished: {} updated, {} not found, {} errors, {} skipped",
            report.updated,
            report.not_found,
            report.errors,
            report.skipped
        );
        Ok(report)
    }

    async fn refresh(&self, key: &ProblemKey) -> Result<bool, String> {
        let metadata = self
            .api
            .fetch_problem_metadata(key.contest_id, &key.index)
            .await
            .map_err(|e| format!("failed to fetch problem {}: {}", key, e))?;

        let metadata = match metadata {
            Some(metadata) => metadata,
            None => return Ok(false),
        };

        let problem = Problem {
            contest_id: key.contest_id,
            index: key.index.clone(),
            name: metadata.name,
            kind: metadata.kind,
            rating: metadata.rating,
            tags: metadata.tags,
            last_updated: Utc::now(),
        };
        self.store
            .upsert_problem(&problem)
            .await
            .map_err(|e| format!("failed to save problem {}: {}", key, e))?;

        Ok(true)
    }

    /// Delete catalog entries whose key could never be served by the problemset API.
    pub async fn cleanup_invalid(&self) -> store::Result<usize> {
        let mut deleted = 0;
        for key in self.store.list_problem_keys().await? {
            if !key.is_problemset() {
                tracing::info!("Delete invalid catalog entry {}", key);
                self.store.delete_problem(&key).await?;
                deleted += 1;
            }
        }

        tracing::info!("{} invalid catalog entries removed", deleted);
        Ok(deleted)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{problem_metadata, submission, FakeApi};

    #[tokio::test]
    async fn test_update_reports_each_outcome() {
        let api = Arc::new(FakeApi::new());
        api.add_problem(problem_metadata(1000, "A", Some(800)));
        api.fail_problem(ProblemKey::new(1000, "C"));
        let store = Arc::new(MemoryStore::new());
        for (id, index) in [(1, "A"), (2, "A"), (3, "B"), (4, "C")] {
            store
                .upsert_submission(&submission(id, "alice", 1000, index, "OK", id))
                .await
                .unwrap();
        }
        store
            .upsert_submission(&submission(5, "alice", 102001, "A", "OK", 5))
            .await
            .unwrap();

        let report = ProblemCatalogUpdater::new(api.clone(), store.clone())
            .update()
            .await
            .unwrap();

        assert_eq!(
            report,
            CatalogReport {
                updated: 1,
                not_found: 1,
                errors: 1,
                skipped: 1,
                total: 4,
            }
        );
        assert_eq!(api.calls("problemset.problem"), 3);
        let problem = store.find_problem(&ProblemKey::new(1000, "A")).await.unwrap().unwrap();
        assert_eq!(problem.rating, Some(800));
    }

    #[tokio::test]
    async fn test_cleanup_invalid_removes_only_bad_keys() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(MemoryStore::new());
        for (contest_id, index) in [(1000, "A"), (102001, "A"), (1000, "1x")] {
            store
                .upsert_problem(&Problem {
                    contest_id,
                    index: index.to_string(),
                    name: String::from("problem"),
                    kind: String::from("PROGRAMMING"),
                    rating: None,
                    tags: Vec::new(),
                    last_updated: Utc::now(),
                })
                .await
                .unwrap();
        }

        let deleted = ProblemCatalogUpdater::new(api, store.clone())
            .cleanup_invalid()
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(store.list_problem_keys().await.unwrap(), vec![ProblemKey::new(1000, "A")]);
    }
}
