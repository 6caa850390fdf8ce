//! Test doubles and builders shared by the unit tests of this crate.

use crate::codeforces::client::{CodeforcesApi, Result, Transport, TransportResponse, UpstreamError};
use crate::codeforces::model::*;
use crate::models::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Transport answering from canned responses per API method.
///
/// Queued responses are consumed first, then the sticky default answer of the method is
/// returned. Methods without any answer get a 500.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<TransportResponse>>>,
    defaults: Mutex<HashMap<String, TransportResponse>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_ok(&self, method: &str, result: &str) {
        self.defaults.lock().unwrap().insert(
            method.to_string(),
            TransportResponse {
                status: 200,
                body: format!(r#"{{"status":"OK","result":{}}}"#, result),
            },
        );
    }

    pub fn push(&self, method: &str, status: u16, body: &str) {
        self.queued
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(TransportResponse {
                status,
                body: body.to_string(),
            });
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, method: &str, _params: &[(&str, String)]) -> Result<TransportResponse> {
        *self.calls.lock().unwrap().entry(method.to_string()).or_insert(0) += 1;

        if let Some(response) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
        {
            return Ok(response);
        }

        Ok(self
            .defaults
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or(TransportResponse {
                status: 500,
                body: String::from("no scripted response"),
            }))
    }
}

/// In-memory upstream keyed by handle, contest and problem.
#[derive(Default)]
pub struct FakeApi {
    profiles: Mutex<HashMap<String, ProfileInfo>>,
    submissions: Mutex<HashMap<String, Vec<RawSubmission>>>,
    ratings: Mutex<HashMap<String, Vec<RatingChangeEvent>>>,
    contests: Mutex<Vec<ContestSummary>>,
    contest_list_down: Mutex<bool>,
    standings: Mutex<HashMap<i64, i32>>,
    problems: Mutex<HashMap<ProblemKey, ProblemMetadata>>,
    failing_problems: Mutex<HashSet<ProblemKey>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, handle: &str, rating: i32, max_rating: i32, rank: &str) {
        self.profiles
            .lock()
            .unwrap()
            .insert(handle.to_string(), profile_info(handle, rating, max_rating, rank));
    }

    pub fn set_submissions(&self, handle: &str, submissions: Vec<RawSubmission>) {
        self.submissions
            .lock()
            .unwrap()
            .insert(handle.to_string(), submissions);
    }

    pub fn set_rating_history(&self, handle: &str, events: Vec<RatingChangeEvent>) {
        self.ratings.lock().unwrap().insert(handle.to_string(), events);
    }

    pub fn set_contests(&self, contests: Vec<ContestSummary>) {
        *self.contests.lock().unwrap() = contests;
    }

    pub fn fail_contest_list(&self) {
        *self.contest_list_down.lock().unwrap() = true;
    }

    pub fn add_standings(&self, contest_id: i64, problem_count: i32) {
        self.standings.lock().unwrap().insert(contest_id, problem_count);
    }

    pub fn add_problem(&self, problem: ProblemMetadata) {
        let key = ProblemKey::new(problem.contest_id, problem.index.clone());
        self.problems.lock().unwrap().insert(key, problem);
    }

    pub fn fail_problem(&self, key: ProblemKey) {
        self.failing_problems.lock().unwrap().insert(key);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &str) {
        *self.calls.lock().unwrap().entry(method.to_string()).or_insert(0) += 1;
    }
}

#[async_trait]
impl CodeforcesApi for FakeApi {
    async fn fetch_profile(&self, handle: &str) -> Result<ProfileInfo> {
        self.record("user.info");
        self.profiles
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or(UpstreamError::NotFound {
                resource: format!("user.info(handles={})", handle),
            })
    }

    async fn fetch_submissions(&self, handle: &str) -> Result<Vec<RawSubmission>> {
        self.record("user.status");
        Ok(self
            .submissions
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_rating_history(&self, handle: &str) -> Result<Vec<RatingChangeEvent>> {
        self.record("user.rating");
        Ok(self.ratings.lock().unwrap().get(handle).cloned().unwrap_or_default())
    }

    async fn fetch_contest_list(&self) -> Result<Vec<ContestSummary>> {
        self.record("contest.list");
        if *self.contest_list_down.lock().unwrap() {
            return Err(UpstreamError::StatusError {
                resource: String::from("contest.list"),
                status: 503,
                message: String::from("down"),
            });
        }
        Ok(self.contests.lock().unwrap().clone())
    }

    async fn fetch_contest_standings(&self, contest_id: i64, handle: &str) -> Result<StandingsSlice> {
        self.record("contest.standings");
        let resource = format!("contest.standings(contestId={}, handles={})", contest_id, handle);
        match self.standings.lock().unwrap().get(&contest_id) {
            Some(&problem_count) => Ok(StandingsSlice {
                contest: contest_summary(contest_id, &format!("Contest {}", contest_id)),
                problem_count,
                rank: None,
            }),
            None => Err(UpstreamError::StatusError {
                resource,
                status: 500,
                message: String::from("standings unavailable"),
            }),
        }
    }

    async fn fetch_problem_metadata(&self, contest_id: i64, index: &str) -> Result<Option<ProblemMetadata>> {
        self.record("problemset.problem");
        let key = ProblemKey::new(contest_id, index);
        if self.failing_problems.lock().unwrap().contains(&key) {
            return Err(UpstreamError::StatusError {
                resource: format!("problemset.problem(contestId={}, problemIndex={})", contest_id, index),
                status: 503,
                message: String::from("temporarily unavailable"),
            });
        }
        Ok(self.problems.lock().unwrap().get(&key).cloned())
    }
}

pub fn profile_info(handle: &str, rating: i32, max_rating: i32, rank: &str) -> ProfileInfo {
    ProfileInfo {
        handle: handle.to_string(),
        rating: Some(rating),
        max_rating: Some(max_rating),
        rank: Some(rank.to_string()),
        max_rank: Some(rank.to_string()),
    }
}

pub fn raw_submission(
    id: i64,
    contest_id: Option<i64>,
    index: &str,
    verdict: &str,
    seconds: i64,
    rating: Option<i32>,
) -> RawSubmission {
    RawSubmission {
        id,
        contest_id,
        creation_time_seconds: seconds,
        problem: RawProblem {
            contest_id,
            index: index.to_string(),
            name: format!("Problem {}", index),
            kind: Some(String::from("PROGRAMMING")),
            rating,
            tags: vec![String::from("math"), String::from("greedy")],
        },
        programming_language: String::from("Rust 2021"),
        verdict: Some(verdict.to_string()),
    }
}

pub fn rating_event(
    contest_id: i64,
    contest_name: &str,
    old_rating: i32,
    new_rating: i32,
    rank: i32,
    seconds: i64,
) -> RatingChangeEvent {
    RatingChangeEvent {
        contest_id,
        contest_name: contest_name.to_string(),
        handle: String::new(),
        rank,
        rating_update_time_seconds: seconds,
        old_rating,
        new_rating,
    }
}

pub fn contest_summary(id: i64, name: &str) -> ContestSummary {
    ContestSummary {
        id,
        name: name.to_string(),
        kind: String::from("CF"),
        phase: String::from("FINISHED"),
        duration_seconds: 7200,
        start_time_seconds: Some(1_600_000_000 + id),
    }
}

pub fn problem_metadata(contest_id: i64, index: &str, rating: Option<i32>) -> ProblemMetadata {
    ProblemMetadata {
        contest_id,
        index: index.to_string(),
        name: format!("Problem {}", index),
        kind: String::from("PROGRAMMING"),
        rating,
        tags: vec![String::from("implementation")],
    }
}

pub fn submission(id: i64, handle: &str, contest_id: i64, index: &str, verdict: &str, seconds: i64) -> Submission {
    Submission {
        submission_id: id,
        contest_id,
        problem_index: index.to_string(),
        problem_name: format!("Problem {}", index),
        problem_rating: None,
        problem_tags: Vec::new(),
        handle: handle.to_string(),
        verdict: Verdict::from_code(Some(verdict)),
        language: String::from("Rust 2021"),
        submitted_at_seconds: seconds,
        rating_change: None,
        rank: None,
        contest_name: None,
        total_problems_in_contest: None,
    }
}
