use crate::models::*;
use crate::store::{ReminderLog, Result, Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, Postgres},
    FromRow, Pool,
};

#[derive(Debug, FromRow)]
struct ProfileRow {
    handle: String,
    name: String,
    email: Option<String>,
    current_rating: i32,
    max_rating: i32,
    rank_tier: String,
    total_solved: i32,
    last_submission_time: Option<DateTime<Utc>>,
    last_sync_time: Option<DateTime<Utc>>,
    email_reminders_enabled: bool,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            handle: row.handle,
            name: row.name,
            email: row.email,
            current_rating: row.current_rating,
            max_rating: row.max_rating,
            rank_tier: row.rank_tier,
            total_solved: row.total_solved,
            last_submission_time: row.last_submission_time,
            last_sync_time: row.last_sync_time,
            email_reminders_enabled: row.email_reminders_enabled,
        }
    }
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    submission_id: i64,
    contest_id: i64,
    problem_index: String,
    problem_name: String,
    problem_rating: Option<i32>,
    problem_tags: Vec<String>,
    handle: String,
    verdict: String,
    language: String,
    submitted_at_seconds: i64,
    rating_change: Option<i32>,
    rank: Option<i32>,
    contest_name: Option<String>,
    total_problems_in_contest: Option<i32>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            submission_id: row.submission_id,
            contest_id: row.contest_id,
            problem_index: row.problem_index,
            problem_name: row.problem_name,
            problem_rating: row.problem_rating,
            problem_tags: row.problem_tags,
            handle: row.handle,
            verdict: Verdict::from(row.verdict),
            language: row.language,
            submitted_at_seconds: row.submitted_at_seconds,
            rating_change: row.rating_change,
            rank: row.rank,
            contest_name: row.contest_name,
            total_problems_in_contest: row.total_problems_in_contest,
        }
    }
}

#[derive(Debug, FromRow)]
struct ContestRow {
    contest_id: i64,
    name: String,
    kind: Option<String>,
    phase: Option<String>,
    start_time_seconds: Option<i64>,
    duration_seconds: Option<i64>,
    total_problems: Option<i32>,
}

impl From<ContestRow> for Contest {
    fn from(row: ContestRow) -> Self {
        Contest {
            contest_id: row.contest_id,
            name: row.name,
            kind: row.kind,
            phase: row.phase,
            start_time_seconds: row.start_time_seconds,
            duration_seconds: row.duration_seconds,
            total_problems: row.total_problems,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProblemRow {
    contest_id: i64,
    problem_index: String,
    name: String,
    kind: String,
    rating: Option<i32>,
    tags: Vec<String>,
    last_updated: DateTime<Utc>,
}

impl From<ProblemRow> for Problem {
    fn from(row: ProblemRow) -> Self {
        Problem {
            contest_id: row.contest_id,
            index: row.problem_index,
            name: row.name,
            kind: row.kind,
            rating: row.rating,
            tags: row.tags,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, FromRow)]
struct RatedContestRow {
    contest_id: i64,
    contest_name: Option<String>,
    rating_change: i32,
    rank: Option<i32>,
    timestamp_seconds: i64,
}

#[derive(Debug, FromRow)]
struct AcceptedCountRow {
    contest_id: i64,
    problem_index: String,
    accepted_count: i64,
}

#[derive(Debug, FromRow)]
struct ProblemKeyRow {
    contest_id: i64,
    problem_index: String,
}

/// PostgreSQL backed [`Store`]. Upserts are written as `MERGE` statements, which require PostgreSQL 15.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1;").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            r#"
            SELECT * FROM "profiles" ORDER BY "handle";
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn find_profile(&self, handle: &str) -> Result<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT * FROM "profiles" WHERE "handle" = $1;
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Profile::from))
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            MERGE INTO "profiles"
            USING
                (VALUES($1::text, $2::text, $3::text, $4::integer, $5::integer, $6::text, $7::integer, $8::timestamptz, $9::timestamptz, $10::boolean))
                AS "profile"("handle", "name", "email", "current_rating", "max_rating", "rank_tier", "total_solved", "last_submission_time", "last_sync_time", "email_reminders_enabled")
            ON
                "profiles"."handle" = "profile"."handle"
            WHEN MATCHED THEN
                UPDATE SET (
                    "name",
                    "email",
                    "current_rating",
                    "max_rating",
                    "rank_tier",
                    "total_solved",
                    "last_submission_time",
                    "last_sync_time",
                    "email_reminders_enabled"
                ) = (
                    "profile"."name",
                    "profile"."email",
                    "profile"."current_rating",
                    "profile"."max_rating",
                    "profile"."rank_tier",
                    "profile"."total_solved",
                    "profile"."last_submission_time",
                    "profile"."last_sync_time",
                    "profile"."email_reminders_enabled"
                )
            WHEN NOT MATCHED THEN
                INSERT (
                    "handle",
                    "name",
                    "email",
                    "current_rating",
                    "max_rating",
                    "rank_tier",
                    "total_solved",
                    "last_submission_time",
                    "last_sync_time",
                    "email_reminders_enabled"
                )
                VALUES (
                    "profile"."handle",
                    "profile"."name",
                    "profile"."email",
                    "profile"."current_rating",
                    "profile"."max_rating",
                    "profile"."rank_tier",
                    "profile"."total_solved",
                    "profile"."last_submission_time",
                    "profile"."last_sync_time",
                    "profile"."email_reminders_enabled"
                );
            "#,
        )
        .bind(&profile.handle)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(profile.current_rating)
        .bind(profile.max_rating)
        .bind(&profile.rank_tier)
        .bind(profile.total_solved)
        .bind(profile.last_submission_time)
        .bind(profile.last_sync_time)
        .bind(profile.email_reminders_enabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_profile_stats(&self, profile: &Profile) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE "profiles"
            SET
                "current_rating" = $2,
                "max_rating" = $3,
                "rank_tier" = $4,
                "total_solved" = $5,
                "last_submission_time" = $6,
                "last_sync_time" = $7
            WHERE
                "handle" = $1;
            "#,
        )
        .bind(&profile.handle)
        .bind(profile.current_rating)
        .bind(profile.max_rating)
        .bind(&profile.rank_tier)
        .bind(profile.total_solved)
        .bind(profile.last_submission_time)
        .bind(profile.last_sync_time)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProfileNotFound(profile.handle.clone()));
        }
        Ok(())
    }

    async fn upsert_submission(&self, submission: &Submission) -> Result<()> {
        sqlx::query(
            r#"
            MERGE INTO "submissions"
            USING
                (VALUES($1::bigint, $2::bigint, $3::text, $4::text, $5::integer, $6::text[], $7::text, $8::text, $9::text, $10::bigint, $11::integer, $12::integer, $13::text, $14::integer))
                AS "submission"("submission_id", "contest_id", "problem_index", "problem_name", "problem_rating", "problem_tags", "handle", "verdict", "language", "submitted_at_seconds", "rating_change", "rank", "contest_name", "total_problems_in_contest")
            ON
                "submissions"."submission_id" = "submission"."submission_id"
            WHEN MATCHED THEN
                UPDATE SET (
                    "contest_id",
                    "problem_index",
                    "problem_name",
                    "problem_rating",
                    "problem_tags",
                    "handle",
                    "verdict",
                    "language",
                    "submitted_at_seconds",
                    "rating_change",
                    "rank",
                    "contest_name",
                    "total_problems_in_contest"
                ) = (
                    "submission"."contest_id",
                    "submission"."problem_index",
                    "submission"."problem_name",
                    COALESCE("submission"."problem_rating", "submissions"."problem_rating"),
                    CASE WHEN cardinality("submission"."problem_tags") = 0 THEN "submissions"."problem_tags" ELSE "submission"."problem_tags" END,
                    "submission"."handle",
                    "submission"."verdict",
                    "submission"."language",
                    "submission"."submitted_at_seconds",
                    COALESCE("submission"."rating_change", "submissions"."rating_change"),
                    COALESCE("submission"."rank", "submissions"."rank"),
                    COALESCE("submission"."contest_name", "submissions"."contest_name"),
                    COALESCE("submission"."total_problems_in_contest", "submissions"."total_problems_in_contest")
                )
            WHEN NOT MATCHED THEN
                INSERT (
                    "submission_id",
                    "contest_id",
                    "problem_index",
                    "problem_name",
                    "problem_rating",
                    "problem_tags",
                    "handle",
                    "verdict",
                    "language",
                    "submitted_at_seconds",
                    "rating_change",
                    "rank",
                    "contest_name",
                    "total_problems_in_contest"
                )
                VALUES (
                    "submission"."submission_id",
                    "submission"."contest_id",
                    "submission"."problem_index",
                    "submission"."problem_name",
                    "submission"."problem_rating",
                    "submission"."problem_tags",
                    "submission"."handle",
                    "submission"."verdict",
                    "submission"."language",
                    "submission"."submitted_at_seconds",
                    "submission"."rating_change",
                    "submission"."rank",
                    "submission"."contest_name",
                    "submission"."total_problems_in_contest"
                );
            "#,
        )
        .bind(submission.submission_id)
        .bind(submission.contest_id)
        .bind(&submission.problem_index)
        .bind(&submission.problem_name)
        .bind(submission.problem_rating)
        .bind(&submission.problem_tags)
        .bind(&submission.handle)
        .bind(submission.verdict.as_code())
        .bind(&submission.language)
        .bind(submission.submitted_at_seconds)
        .bind(submission.rating_change)
        .bind(submission.rank)
        .bind(&submission.contest_name)
        .bind(submission.total_problems_in_contest)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_submission(&self, submission_id: i64) -> Result<Option<Submission>> {
        let row: Option<SubmissionRow> = sqlx::query_as(
            r#"
            SELECT * FROM "submissions" WHERE "submission_id" = $1;
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Submission::from))
    }

    async fn apply_contest_result(&self, handle: &str, result: &ContestResult) -> Result<u64> {
        let updated = sqlx::query(
            r#"
            UPDATE "submissions"
            SET
                "rating_change" = $3,
                "rank" = $4,
                "contest_name" = $5,
                "total_problems_in_contest" = $6
            WHERE
                "handle" = $1
                AND "contest_id" = $2;
            "#,
        )
        .bind(handle)
        .bind(result.contest_id)
        .bind(result.rating_change)
        .bind(result.rank)
        .bind(&result.contest_name)
        .bind(result.total_problems)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    async fn rated_contests(&self, handle: &str) -> Result<Vec<RatedContest>> {
        let rows: Vec<RatedContestRow> = sqlx::query_as(
            r#"
            SELECT
                "submissions"."contest_id" AS "contest_id",
                MAX("submissions"."contest_name") AS "contest_name",
                MAX("submissions"."rating_change") AS "rating_change",
                MAX("submissions"."rank") AS "rank",
                COALESCE(MAX("contests"."start_time_seconds"), MIN("submissions"."submitted_at_seconds")) AS "timestamp_seconds"
            FROM
                "submissions"
            LEFT JOIN "contests" USING("contest_id")
            WHERE
                "submissions"."handle" = $1
                AND "submissions"."rating_change" IS NOT NULL
            GROUP BY
                "submissions"."contest_id"
            ORDER BY
                "timestamp_seconds",
                "contest_id";
            "#,
        )
        .bind(handle)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RatedContest {
                contest_id: row.contest_id,
                contest_name: row.contest_name.unwrap_or_default(),
                rating_change: row.rating_change,
                rank: row.rank,
                timestamp_seconds: row.timestamp_seconds,
            })
            .collect())
    }

    async fn find_contest(&self, contest_id: i64) -> Result<Option<Contest>> {
        let row: Option<ContestRow> = sqlx::query_as(
            r#"
            SELECT * FROM "contests" WHERE "contest_id" = $1;
            "#,
        )
        .bind(contest_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Contest::from))
    }

    async fn upsert_contest(&self, contest: &Contest) -> Result<()> {
        sqlx::query(
            r#"
            MERGE INTO "contests"
            USING
                (VALUES($1::bigint, $2::text, $3::text, $4::text, $5::bigint, $6::bigint, $7::integer))
                AS "contest"("contest_id", "name", "kind", "phase", "start_time_seconds", "duration_seconds", "total_problems")
            ON
                "contests"."contest_id" = "contest"."contest_id"
            WHEN MATCHED THEN
                UPDATE SET (
                    "name",
                    "kind",
                    "phase",
                    "start_time_seconds",
                    "duration_seconds",
                    "total_problems"
                ) = (
                    "contest"."name",
                    COALESCE("contest"."kind", "contests"."kind"),
                    COALESCE("contest"."phase", "contests"."phase"),
                    COALESCE("contest"."start_time_seconds", "contests"."start_time_seconds"),
                    COALESCE("contest"."duration_seconds", "contests"."duration_seconds"),
                    COALESCE("contest"."total_problems", "contests"."total_problems")
                )
            WHEN NOT MATCHED THEN
                INSERT (
                    "contest_id",
                    "name",
                    "kind",
                    "phase",
                    "start_time_seconds",
                    "duration_seconds",
                    "total_problems"
                )
                VALUES (
                    "contest"."contest_id",
                    "contest"."name",
                    "contest"."kind",
                    "contest"."phase",
                    "contest"."start_time_seconds",
                    "contest"."duration_seconds",
                    "contest"."total_problems"
                );
            "#,
        )
        .bind(contest.contest_id)
        .bind(&contest.name)
        .bind(&contest.kind)
        .bind(&contest.phase)
        .bind(contest.start_time_seconds)
        .bind(contest.duration_seconds)
        .bind(contest.total_problems)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_problem(&self, key: &ProblemKey) -> Result<Option<Problem>> {
        let row: Option<ProblemRow> = sqlx::query_as(
            r#"
            SELECT * FROM "problems" WHERE "contest_id" = $1 AND "problem_index" = $2;
            "#,
        )
        .bind(key.contest_id)
        .bind(&key.index)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Problem::from))
    }

    async fn upsert_problem(&self, problem: &Problem) -> Result<()> {
        sqlx::query(
            r#"
            MERGE INTO "problems"
            USING
                (VALUES($1::bigint, $2::text, $3::text, $4::text, $5::integer, $6::text[], $7::timestamptz))
                AS "problem"("contest_id", "problem_index", "name", "kind", "rating", "tags", "last_updated")
            ON
                "problems"."contest_id" = "problem"."contest_id"
                AND "problems"."problem_index" = "problem"."problem_index"
            WHEN MATCHED THEN
                UPDATE SET (
                    "name",
                    "kind",
                    "rating",
                    "tags",
                    "last_updated"
                ) = (
                    "problem"."name",
                    "problem"."kind",
                    "problem"."rating",
                    "problem"."tags",
                    "problem"."last_updated"
                )
            WHEN NOT MATCHED THEN
                INSERT (
                    "contest_id",
                    "problem_index",
                    "name",
                    "kind",
                    "rating",
                    "tags",
                    "last_updated"
                )
                VALUES (
                    "problem"."contest_id",
                    "problem"."problem_index",
                    "problem"."name",
                    "problem"."kind",
                    "problem"."rating",
                    "problem"."tags",
                    "problem"."last_updated"
                );
            "#,
        )
        .bind(problem.contest_id)
        .bind(&problem.index)
        .bind(&problem.name)
        .bind(&problem.kind)
        .bind(problem.rating)
        .bind(&problem.tags)
        .bind(problem.last_updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_problem_keys(&self) -> Result<Vec<ProblemKey>> {
        let rows: Vec<ProblemKeyRow> = sqlx::query_as(
            r#"
            SELECT "contest_id", "problem_index" FROM "problems" ORDER BY "contest_id", "problem_index";
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProblemKey::new(row.contest_id, row.problem_index))
            .collect())
    }

    async fn delete_problem(&self, key: &ProblemKey) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM "problems" WHERE "contest_id" = $1 AND "problem_index" = $2;
            "#,
        )
        .bind(key.contest_id)
        .bind(&key.index)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn accepted_problem_counts(&self) -> Result<Vec<SolvedProblemCount>> {
        let rows: Vec<AcceptedCountRow> = sqlx::query_as(
            r#"
            SELECT
                "contest_id",
                "problem_index",
                COUNT(*) AS "accepted_count"
            FROM
                "submissions"
            WHERE
                "verdict" = 'OK'
            GROUP BY
                "contest_id",
                "problem_index"
            ORDER BY
                "accepted_count" DESC,
                "contest_id",
                "problem_index";
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SolvedProblemCount {
                key: ProblemKey::new(row.contest_id, row.problem_index),
                accepted_count: row.accepted_count,
            })
            .collect())
    }

    async fn record_reminder(&self, log: &ReminderLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO "reminder_logs" ("handle", "sent_at", "success") VALUES ($1, $2, $3);
            "#,
        )
        .bind(&log.handle)
        .bind(log.sent_at)
        .bind(log.success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_reminders(&self, handle: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM "reminder_logs" WHERE "handle" = $1;
            "#,
        )
        .bind(handle)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::submission;
    use std::env;

    async fn connect() -> PgStore {
        let url = env::var("DATABASE_URL").unwrap();
        let store = PgStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore]
    async fn test_upsert_submission_keeps_contest_fields() {
        let store = connect().await;

        let mut record = submission(900000001, "pg-test-alice", 1000, "A", "OK", 100);
        record.rating_change = Some(42);
        record.problem_rating = Some(800);
        store.upsert_submission(&record).await.unwrap();

        let fresh = Submission {
            rating_change: None,
            problem_rating: None,
            ..record.clone()
        };
        store.upsert_submission(&fresh).await.unwrap();

        let stored = store.find_submission(900000001).await.unwrap().unwrap();
        assert_eq!(stored.rating_change, Some(42));
        assert_eq!(stored.problem_rating, Some(800));
    }

    #[tokio::test]
    #[ignore]
    async fn test_update_profile_stats_of_unknown_handle() {
        let store = connect().await;
        let result = store
            .update_profile_stats(&Profile::new("pg-test-ghost", "Ghost"))
            .await;
        assert!(matches!(result, Err(StoreError::ProfileNotFound(_))));
    }
}
