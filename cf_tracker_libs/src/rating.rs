use crate::models::RatedContest;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingPoint {
    pub contest_id: i64,
    pub contest_name: String,
    pub timestamp: DateTime<Utc>,
    pub rating_before: i32,
    pub rating_after: i32,
    pub rating_change: i32,
    pub rank: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RatingProgression {
    /// Points inside the window, oldest first.
    pub points: Vec<RatingPoint>,
    /// Whether the newest point ends at the current rating.
    pub anchored_to_current: bool,
}

/// Time range of contests to report, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl RatingWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            since: Some(now - Duration::days(days)),
            until: None,
        }
    }

    pub fn contains(&self, timestamp_seconds: i64) -> bool {
        self.since.map_or(true, |since| timestamp_seconds >= since.timestamp())
            && self.until.map_or(true, |until| timestamp_seconds <= until.timestamp())
    }
}

/// Reconstruct absolute ratings from per-contest deltas.
///
/// The walk runs backwards from `current_rating` over the whole history, so every point is
/// anchored correctly even when the window cuts off the newest contests. `history` must be
/// ordered oldest first.
pub fn rating_progression(current_rating: i32, history: &[RatedContest], window: RatingWindow) -> RatingProgression {
    let in_window = |contest: &RatedContest| window.contains(contest.timestamp_seconds);

    let mut points = Vec::new();
    let mut after = current_rating;
    for contest in history.iter().rev() {
        let before = after - contest.rating_change;
        if in_window(contest) {
            points.push(RatingPoint {
                contest_id: contest.contest_id,
                contest_name: contest.contest_name.clone(),
                timestamp: Utc
                    .timestamp_opt(contest.timestamp_seconds, 0)
                    .single()
                    .unwrap_or_default(),
                rating_before: before,
                rating_after: after,
                rating_change: contest.rating_change,
                rank: contest.rank,
            });
        }
        after = before;
    }
    points.reverse();

    let anchored_to_current = history.last().map_or(true, |newest| in_window(newest));

    RatingProgression {
        points,
        anchored_to_current,
    }
}
