use crate::models::{normalize_tags, Contest, ContestResult};
use serde::{Deserialize, Serialize};

/// Every Codeforces API method wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub comment: Option<String>,
    pub result: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    pub handle: String,
    pub rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub rank: Option<String>,
    pub max_rank: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawProblem {
    pub contest_id: Option<i64>,
    pub index: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub rating: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    pub id: i64,
    pub contest_id: Option<i64>,
    pub creation_time_seconds: i64,
    pub problem: RawProblem,
    #[serde(default)]
    pub programming_language: String,
    pub verdict: Option<String>,
}

impl RawSubmission {
    /// The submission's own contest id, or the problem's when the former is missing.
    pub fn contest_id(&self) -> Option<i64> {
        self.contest_id.or(self.problem.contest_id)
    }
}

/// One contest's effect on a handle's rating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RatingChangeEvent {
    pub contest_id: i64,
    pub contest_name: String,
    #[serde(default)]
    pub handle: String,
    pub rank: i32,
    pub rating_update_time_seconds: i64,
    pub old_rating: i32,
    pub new_rating: i32,
}

impl RatingChangeEvent {
    pub fn rating_change(&self) -> i32 {
        self.new_rating - self.old_rating
    }

    pub fn to_result(&self, total_problems: i32) -> ContestResult {
        ContestResult {
            contest_id: self.contest_id,
            contest_name: self.contest_name.clone(),
            rating_change: self.rating_change(),
            rank: self.rank,
            total_problems,
        }
    }

    /// Contest record derived from the rating event alone.
    ///
    /// The contest kind is inferred from the name since the event does not carry it.
    pub fn to_contest(&self, total_problems: i32) -> Contest {
        let kind = if self.contest_name.contains("Div.") {
            "CF"
        } else {
            "Other"
        };
        Contest {
            contest_id: self.contest_id,
            name: self.contest_name.clone(),
            kind: Some(String::from(kind)),
            phase: None,
            start_time_seconds: Some(self.rating_update_time_seconds),
            duration_seconds: None,
            total_problems: Some(total_problems),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContestSummary {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub phase: String,
    pub duration_seconds: i64,
    pub start_time_seconds: Option<i64>,
}

impl ContestSummary {
    pub fn to_contest(&self) -> Contest {
        Contest {
            contest_id: self.id,
            name: self.name.clone(),
            kind: Some(self.kind.clone()),
            phase: Some(self.phase.clone()),
            start_time_seconds: self.start_time_seconds,
            duration_seconds: Some(self.duration_seconds),
            total_problems: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RanklistRow {
    pub rank: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsResponse {
    pub contest: ContestSummary,
    #[serde(default)]
    pub problems: Vec<RawProblem>,
    #[serde(default)]
    pub rows: Vec<RanklistRow>,
}

/// Part of a contest's standings restricted to a single handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingsSlice {
    pub contest: ContestSummary,
    pub problem_count: i32,
    pub rank: Option<i32>,
}

impl From<StandingsResponse> for StandingsSlice {
    fn from(response: StandingsResponse) -> Self {
        Self {
            problem_count: response.problems.len() as i32,
            rank: response.rows.first().map(|row| row.rank),
            contest: response.contest,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProblemResponse {
    pub problem: RawProblem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemMetadata {
    pub contest_id: i64,
    pub index: String,
    pub name: String,
    pub kind: String,
    pub rating: Option<i32>,
    pub tags: Vec<String>,
}

impl ProblemMetadata {
    pub fn from_raw(contest_id: i64, raw: RawProblem) -> Self {
        Self {
            contest_id: raw.contest_id.unwrap_or(contest_id),
            index: raw.index,
            name: raw.name,
            kind: raw.kind.unwrap_or_else(|| String::from("PROGRAMMING")),
            rating: raw.rating,
            tags: normalize_tags(raw.tags),
        }
    }
}
