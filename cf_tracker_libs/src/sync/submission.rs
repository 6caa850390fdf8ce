use crate::codeforces::{model::RawSubmission, CodeforcesApi};
use crate::models::*;
use crate::store::{self, Store};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap};

/// Result of merging one profile's submission list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Distinct problems with at least one accepted submission.
    pub solved: BTreeSet<ProblemKey>,
    pub last_submission_time: Option<DateTime<Utc>>,
    pub upserted: usize,
    /// Submissions dropped because they name no contest.
    pub quarantined: usize,
    pub warnings: Vec<String>,
}

/// Problem data used to fill the gaps of a submission payload.
#[derive(Debug, Clone)]
struct KnownProblem {
    rating: Option<i32>,
    tags: Vec<String>,
}

pub struct SubmissionReconciler<'a> {
    api: &'a dyn CodeforcesApi,
    store: &'a dyn Store,
    known_problems: HashMap<ProblemKey, Option<KnownProblem>>,
}

impl<'a> SubmissionReconciler<'a> {
    pub fn new(api: &'a dyn CodeforcesApi, store: &'a dyn Store) -> Self {
        Self {
            api,
            store,
            known_problems: HashMap::new(),
        }
    }

    /// Upsert every submission of `handle` and derive the solved set.
    ///
    /// Stops at the first persistence failure.
    pub async fn reconcile(
        &mut self,
        handle: &str,
        submissions: &[RawSubmission],
    ) -> store::Result<SubmissionReport> {
        let mut report = SubmissionReport::default();

        for raw in submissions {
            report.last_submission_time = report
                .last_submission_time
                .max(Utc.timestamp_opt(raw.creation_time_seconds, 0).single());

            let contest_id = match raw.contest_id() {
                Some(contest_id) => contest_id,
                None => {
                    tracing::warn!("submission {} of {} has no contest id, skipped", raw.id, handle);
                    report.quarantined += 1;
                    continue;
                }
            };

            let mut submission = Submission {
                submission_id: raw.id,
                contest_id,
                problem_index: raw.problem.index.clone(),
                problem_name: raw.problem.name.clone(),
                problem_rating: raw.problem.rating,
                problem_tags: normalize_tags(raw.problem.tags.iter().cloned()),
                handle: handle.to_string(),
                verdict: Verdict::from_code(raw.verdict.as_deref()),
                language: raw.programming_language.clone(),
                submitted_at_seconds: raw.creation_time_seconds,
                rating_change: None,
                rank: None,
                contest_name: None,
                total_problems_in_contest: None,
            };

            if submission.problem_rating.is_none() {
                if let Some(known) = self.lookup(&submission.problem_key(), &mut report.warnings).await? {
                    submission.problem_rating = known.rating;
                    if submission.problem_tags.is_empty() {
                        submission.problem_tags = known.tags;
                    }
                }
            }

            self.store.upsert_submission(&submission).await?;
            report.upserted += 1;

            if submission.verdict.is_accepted() {
                report.solved.insert(submission.problem_key());
            }
        }

        tracing::info!(
            "{} submissions of {} reconciled ({} solved, {} quarantined)",
            report.upserted,
            handle,
            report.solved.len(),
            report.quarantined
        );

        Ok(report)
    }

    /// Find metadata of a problem, asking the upstream at most once per problem and run.
    async fn lookup(
        &mut self,
        key: &ProblemKey,
        warnings: &mut Vec<String>,
    ) -> store::Result<Option<KnownProblem>> {
        if let Some(known) = self.known_problems.get(key) {
            return Ok(known.clone());
        }

        let known = match self.store.find_problem(key).await? {
            Some(problem) => Some(KnownProblem {
                rating: problem.rating,
                tags: problem.tags,
            }),
            None if key.is_problemset() => {
                match self.api.fetch_problem_metadata(key.contest_id, &key.index).await {
                    Ok(Some(metadata)) => {
                        let problem = Problem {
                            contest_id: key.contest_id,
                            index: key.index.clone(),
                            name: metadata.name,
                            kind: metadata.kind,
                            rating: metadata.rating,
                            tags: metadata.tags,
                            last_updated: Utc::now(),
                        };
                        self.store.upsert_problem(&problem).await?;
                        Some(KnownProblem {
                            rating: problem.rating,
                            tags: problem.tags,
                        })
                    }
                    Ok(None) => None,
                    Err(e) => {
                        let message = format!("failed to fetch metadata of problem {}: {}", key, e);
                        tracing::warn!(message);
                        warnings.push(message);
                        None
                    }
                }
            }
            None => None,
        };

        self.known_problems.insert(key.clone(), known.clone());
        Ok(known)
    }
}
