use chrono::{DateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contest ids from this value upward belong to gym contests, which the problemset API does not serve.
pub const GYM_CONTEST_ID_START: i64 = 100_000;

static PROBLEM_INDEX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][0-9]*$").unwrap());

/// Natural key of a problem: `(contest_id, problem_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemKey {
    pub contest_id: i64,
    pub index: String,
}

impl ProblemKey {
    pub fn new(contest_id: i64, index: impl Into<String>) -> Self {
        Self {
            contest_id,
            index: index.into(),
        }
    }

    /// Whether the key names a regular problemset problem.
    ///
    /// Gym contests and malformed indices are rejected so they never enter the catalog
    /// and never trigger a metadata lookup.
    pub fn is_problemset(&self) -> bool {
        self.contest_id > 0
            && self.contest_id < GYM_CONTEST_ID_START
            && PROBLEM_INDEX_PATTERN.is_match(&self.index)
    }
}

impl fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.contest_id, self.index)
    }
}

/// Judge outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Verdict {
    Accepted,
    Rejected(String),
    Other(String),
}

const REJECTED_VERDICTS: [&str; 13] = [
    "FAILED",
    "PARTIAL",
    "COMPILATION_ERROR",
    "RUNTIME_ERROR",
    "WRONG_ANSWER",
    "PRESENTATION_ERROR",
    "TIME_LIMIT_EXCEEDED",
    "MEMORY_LIMIT_EXCEEDED",
    "IDLENESS_LIMIT_EXCEEDED",
    "SECURITY_VIOLATED",
    "CRASHED",
    "INPUT_PREPARATION_CRASHED",
    "CHALLENGED",
];

impl Verdict {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("OK") => Verdict::Accepted,
            Some(code) if REJECTED_VERDICTS.contains(&code) => Verdict::Rejected(code.to_string()),
            Some(code) => Verdict::Other(code.to_string()),
            None => Verdict::Other(String::from("UNKNOWN")),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            Verdict::Accepted => "OK",
            Verdict::Rejected(code) | Verdict::Other(code) => code,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl From<String> for Verdict {
    fn from(code: String) -> Self {
        Verdict::from_code(Some(&code))
    }
}

impl From<Verdict> for String {
    fn from(verdict: Verdict) -> Self {
        verdict.as_code().to_string()
    }
}

/// Tracked competitive-programming profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub handle: String,
    pub name: String,
    pub email: Option<String>,
    pub current_rating: i32,
    pub max_rating: i32,
    pub rank_tier: String,
    pub total_solved: i32,
    pub last_submission_time: Option<DateTime<Utc>>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub email_reminders_enabled: bool,
}

impl Profile {
    /// A freshly registered profile that has never been synchronized.
    pub fn new(handle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: name.into(),
            email: None,
            current_rating: 0,
            max_rating: 0,
            rank_tier: String::from("unrated"),
            total_solved: 0,
            last_submission_time: None,
            last_sync_time: None,
            email_reminders_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: i64,
    pub contest_id: i64,
    pub problem_index: String,
    pub problem_name: String,
    pub problem_rating: Option<i32>,
    pub problem_tags: Vec<String>,
    pub handle: String,
    pub verdict: Verdict,
    pub language: String,
    pub submitted_at_seconds: i64,
    pub rating_change: Option<i32>,
    pub rank: Option<i32>,
    pub contest_name: Option<String>,
    pub total_problems_in_contest: Option<i32>,
}

impl Submission {
    pub fn problem_key(&self) -> ProblemKey {
        ProblemKey::new(self.contest_id, self.problem_index.clone())
    }

    /// Merge a freshly derived submission into the stored one.
    ///
    /// Fields derived directly from the payload are overwritten. Problem rating and tags
    /// only replace stored values when present, and contest-filled fields are kept
    /// because reconciliation of the owning contest writes them separately.
    pub fn merged_into(&self, stored: &Submission) -> Submission {
        Submission {
            submission_id: self.submission_id,
            contest_id: self.contest_id,
            problem_index: self.problem_index.clone(),
            problem_name: self.problem_name.clone(),
            problem_rating: self.problem_rating.or(stored.problem_rating),
            problem_tags: if self.problem_tags.is_empty() {
                stored.problem_tags.clone()
            } else {
                self.problem_tags.clone()
            },
            handle: self.handle.clone(),
            verdict: self.verdict.clone(),
            language: self.language.clone(),
            submitted_at_seconds: self.submitted_at_seconds,
            rating_change: self.rating_change.or(stored.rating_change),
            rank: self.rank.or(stored.rank),
            contest_name: self.contest_name.clone().or_else(|| stored.contest_name.clone()),
            total_problems_in_contest: self
                .total_problems_in_contest
                .or(stored.total_problems_in_contest),
        }
    }

    pub fn apply_contest_result(&mut self, result: &ContestResult) {
        self.rating_change = Some(result.rating_change);
        self.rank = Some(result.rank);
        self.contest_name = Some(result.contest_name.clone());
        self.total_problems_in_contest = Some(result.total_problems);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub contest_id: i64,
    pub name: String,
    pub kind: Option<String>,
    pub phase: Option<String>,
    pub start_time_seconds: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub total_problems: Option<i32>,
}

impl Contest {
    /// Last writer wins for every field the writer knows; unknown fields keep the stored value.
    pub fn merged_into(&self, stored: &Contest) -> Contest {
        Contest {
            contest_id: self.contest_id,
            name: self.name.clone(),
            kind: self.kind.clone().or_else(|| stored.kind.clone()),
            phase: self.phase.clone().or_else(|| stored.phase.clone()),
            start_time_seconds: self.start_time_seconds.or(stored.start_time_seconds),
            duration_seconds: self.duration_seconds.or(stored.duration_seconds),
            total_problems: self.total_problems.or(stored.total_problems),
        }
    }
}

/// Canonical problem metadata kept in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub contest_id: i64,
    pub index: String,
    pub name: String,
    pub kind: String,
    pub rating: Option<i32>,
    pub tags: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Problem {
    pub fn key(&self) -> ProblemKey {
        ProblemKey::new(self.contest_id, self.index.clone())
    }
}

/// Fields written onto every submission of one handle in one rated contest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestResult {
    pub contest_id: i64,
    pub contest_name: String,
    pub rating_change: i32,
    pub rank: i32,
    pub total_problems: i32,
}

/// Read-side projection of a rated contest, rebuilt from enriched submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedContest {
    pub contest_id: i64,
    pub contest_name: String,
    pub rating_change: i32,
    pub rank: Option<i32>,
    pub timestamp_seconds: i64,
}

/// Distinct accepted problem together with how many accepted submissions reference it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedProblemCount {
    pub key: ProblemKey,
    pub accepted_count: i64,
}

/// Sort and de-duplicate tags so that they behave as a set.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter()
        .map(Into::into)
        .sorted()
        .dedup()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_problem_key_validation() {
        assert!(ProblemKey::new(1000, "A").is_problemset());
        assert!(ProblemKey::new(1559, "D1").is_problemset());
        assert!(!ProblemKey::new(0, "A").is_problemset());
        assert!(!ProblemKey::new(102001, "A").is_problemset());
        assert!(!ProblemKey::new(1000, "1A").is_problemset());
        assert!(!ProblemKey::new(1000, "").is_problemset());
    }

    #[test]
    fn test_verdict_codes() {
        assert_eq!(Verdict::from_code(Some("OK")), Verdict::Accepted);
        assert_eq!(
            Verdict::from_code(Some("WRONG_ANSWER")),
            Verdict::Rejected(String::from("WRONG_ANSWER"))
        );
        assert_eq!(
            Verdict::from_code(Some("TESTING")),
            Verdict::Other(String::from("TESTING"))
        );
        assert_eq!(Verdict::from_code(None).as_code(), "UNKNOWN");
    }

    #[test]
    fn test_submission_merge_keeps_contest_fields() {
        let stored = Submission {
            submission_id: 1,
            contest_id: 1000,
            problem_index: String::from("A"),
            problem_name: String::from("Old name"),
            problem_rating: Some(800),
            problem_tags: vec![String::from("math")],
            handle: String::from("alice"),
            verdict: Verdict::Accepted,
            language: String::from("Rust"),
            submitted_at_seconds: 100,
            rating_change: Some(50),
            rank: Some(12),
            contest_name: Some(String::from("Round #1")),
            total_problems_in_contest: Some(6),
        };
        let fresh = Submission {
            problem_name: String::from("New name"),
            problem_rating: None,
            problem_tags: Vec::new(),
            rating_change: None,
            rank: None,
            contest_name: None,
            total_problems_in_contest: None,
            ..stored.clone()
        };

        let merged = fresh.merged_into(&stored);
        assert_eq!(merged.problem_name, "New name");
        assert_eq!(merged.problem_rating, Some(800));
        assert_eq!(merged.problem_tags, vec![String::from("math")]);
        assert_eq!(merged.rating_change, Some(50));
        assert_eq!(merged.contest_name.as_deref(), Some("Round #1"));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec!["math", "dp", "math"]);
        assert_eq!(tags, vec![String::from("dp"), String::from("math")]);
    }
}
