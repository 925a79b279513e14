use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::attempt::Attempt;
use crate::models::candidate::Candidate;
use crate::models::question::{BaseQuestion, QuestionVariant};
use crate::models::session::{AssignedQuestion, TestLink, TestSession};
use crate::store::Store;

/// Postgres-backed store. Sessions embed their assigned-question and
/// distraction-event lists as JSONB; the (candidate, link) and
/// (session, question_index) uniqueness constraints in the schema are
/// the backstop for concurrent creation and double submission.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct BaseQuestionRow {
    id: Uuid,
    topic: String,
    difficulty: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl BaseQuestionRow {
    fn into_model(self) -> Result<BaseQuestion> {
        Ok(BaseQuestion {
            id: self.id,
            topic: self.topic,
            difficulty: self.difficulty.parse()?,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct VariantRow {
    id: Uuid,
    question_id: Uuid,
    question_text: String,
    options: Json<Vec<String>>,
    correct_index: i32,
    correct_answer: String,
    approved: bool,
    is_generated: bool,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VariantRow> for QuestionVariant {
    fn from(row: VariantRow) -> Self {
        QuestionVariant {
            id: row.id,
            question_id: row.question_id,
            question_text: row.question_text,
            options: row.options.0,
            correct_index: row.correct_index,
            correct_answer: row.correct_answer,
            approved: row.approved,
            is_generated: row.is_generated,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct LinkRow {
    link_id: String,
    test_name: String,
    total_questions: i32,
    time_per_question: i32,
    topics: Json<Vec<String>>,
    max_uses: i32,
    current_uses: i32,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<LinkRow> for TestLink {
    fn from(row: LinkRow) -> Self {
        TestLink {
            link_id: row.link_id,
            test_name: row.test_name,
            total_questions: row.total_questions,
            time_per_question: row.time_per_question,
            topics: row.topics.0,
            max_uses: row.max_uses,
            current_uses: row.current_uses,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    candidate_id: Uuid,
    link_id: String,
    assigned_questions: Json<Vec<AssignedQuestion>>,
    current_index: i32,
    time_per_question: i32,
    question_start_time: DateTime<Utc>,
    started_at: DateTime<Utc>,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    distraction_events: Json<Vec<DateTime<Utc>>>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for TestSession {
    fn from(row: SessionRow) -> Self {
        TestSession {
            id: row.id,
            candidate_id: row.candidate_id,
            link_id: row.link_id,
            assigned_questions: row.assigned_questions.0,
            current_index: row.current_index,
            time_per_question: row.time_per_question,
            question_start_time: row.question_start_time,
            started_at: row.started_at,
            completed: row.completed,
            completed_at: row.completed_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            distraction_events: row.distraction_events.0,
            created_at: row.created_at,
        }
    }
}

fn conflict_on_unique(err: sqlx::Error, message: &str) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(message.to_string())
        }
        _ => Error::from(err),
    }
}

const SESSION_COLUMNS: &str = "id, candidate_id, link_id, assigned_questions, current_index, \
     time_per_question, question_start_time, started_at, completed, completed_at, \
     ip_address, user_agent, distraction_events, created_at";

#[async_trait]
impl Store for PgStore {
    async fn find_base_questions(&self, topics: &[String]) -> Result<Vec<BaseQuestion>> {
        let rows = sqlx::query_as::<_, BaseQuestionRow>(
            r#"SELECT id, topic, difficulty, description, created_at
               FROM base_questions
               WHERE cardinality($1::text[]) = 0 OR topic = ANY($1)"#,
        )
        .bind(topics)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BaseQuestionRow::into_model).collect()
    }

    async fn find_approved_variants(&self, question_id: Uuid) -> Result<Vec<QuestionVariant>> {
        let rows = sqlx::query_as::<_, VariantRow>(
            r#"SELECT id, question_id, question_text, options, correct_index, correct_answer,
                      approved, is_generated, approved_at, approved_by, created_at
               FROM question_variants
               WHERE question_id = $1 AND approved = TRUE"#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<QuestionVariant>> {
        let row = sqlx::query_as::<_, VariantRow>(
            r#"SELECT id, question_id, question_text, options, correct_index, correct_answer,
                      approved, is_generated, approved_at, approved_by, created_at
               FROM question_variants WHERE id = $1"#,
        )
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_link(&self, link: &TestLink) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO test_links
               (link_id, test_name, total_questions, time_per_question, topics,
                max_uses, current_uses, expires_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&link.link_id)
        .bind(&link.test_name)
        .bind(link.total_questions)
        .bind(link.time_per_question)
        .bind(Json(&link.topics))
        .bind(link.max_uses)
        .bind(link.current_uses)
        .bind(link.expires_at)
        .bind(link.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Test link id already exists"))?;
        Ok(())
    }

    async fn get_link(&self, link_id: &str) -> Result<Option<TestLink>> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"SELECT link_id, test_name, total_questions, time_per_question, topics,
                      max_uses, current_uses, expires_at, created_at
               FROM test_links WHERE link_id = $1"#,
        )
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_links(&self, offset: i64, limit: i64) -> Result<Vec<TestLink>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"SELECT link_id, test_name, total_questions, time_per_question, topics,
                      max_uses, current_uses, expires_at, created_at
               FROM test_links
               ORDER BY created_at DESC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_link(&self, link_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM test_links WHERE link_id = $1")
            .bind(link_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_link_use(&self, link_id: &str) -> Result<()> {
        sqlx::query("UPDATE test_links SET current_uses = current_uses + 1 WHERE link_id = $1")
            .bind(link_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_or_create_candidate(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Candidate> {
        // No-op update keeps the existing row while still RETURNING it,
        // so concurrent starts for a new email cannot race.
        let candidate = sqlx::query_as::<_, Candidate>(
            r#"INSERT INTO candidates (id, name, email, phone, created_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (email) DO UPDATE SET name = candidates.name
               RETURNING id, name, email, phone, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(candidate)
    }

    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        let candidate = sqlx::query_as::<_, Candidate>(
            "SELECT id, name, email, phone, created_at FROM candidates WHERE id = $1",
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(candidate)
    }

    async fn insert_session(&self, session: &TestSession) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO test_sessions
               (id, candidate_id, link_id, assigned_questions, current_index,
                time_per_question, question_start_time, started_at, completed, completed_at,
                ip_address, user_agent, distraction_events, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(session.id)
        .bind(session.candidate_id)
        .bind(&session.link_id)
        .bind(Json(&session.assigned_questions))
        .bind(session.current_index)
        .bind(session.time_per_question)
        .bind(session.question_start_time)
        .bind(session.started_at)
        .bind(session.completed)
        .bind(session.completed_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(Json(&session.distraction_events))
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, "A session already exists for this candidate and link")
        })?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<TestSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM test_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_session(
        &self,
        candidate_id: Uuid,
        link_id: &str,
    ) -> Result<Option<TestSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM test_sessions WHERE candidate_id = $1 AND link_id = $2",
            SESSION_COLUMNS
        ))
        .bind(candidate_id)
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn advance_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        next_start: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE test_sessions
               SET current_index = current_index + 1, question_start_time = $3
               WHERE id = $1 AND completed = FALSE AND current_index = $2"#,
        )
        .bind(session_id)
        .bind(expected_index)
        .bind(next_start)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE test_sessions
               SET current_index = current_index + 1, completed = TRUE, completed_at = $3
               WHERE id = $1 AND completed = FALSE AND current_index = $2"#,
        )
        .bind(session_id)
        .bind(expected_index)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_distraction(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE test_sessions
               SET distraction_events = distraction_events || $2
               WHERE id = $1 AND completed = FALSE"#,
        )
        .bind(session_id)
        .bind(Json(vec![at]))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        // Attempts go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM test_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_completed_sessions(&self, offset: i64, limit: i64) -> Result<Vec<TestSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM test_sessions WHERE completed = TRUE \
             ORDER BY completed_at DESC LIMIT $1 OFFSET $2",
            SESSION_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_completed_sessions(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM test_sessions WHERE completed = TRUE",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO attempts
               (id, session_id, candidate_id, variant_id, question_index, selected_index,
                selected_answer, is_correct, time_taken, auto_submitted, submitted_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(attempt.id)
        .bind(attempt.session_id)
        .bind(attempt.candidate_id)
        .bind(attempt.variant_id)
        .bind(attempt.question_index)
        .bind(attempt.selected_index)
        .bind(&attempt.selected_answer)
        .bind(attempt.is_correct)
        .bind(attempt.time_taken)
        .bind(attempt.auto_submitted)
        .bind(attempt.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, "An attempt is already recorded for this question")
        })?;
        Ok(())
    }

    async fn attempts_for_session(&self, session_id: Uuid) -> Result<Vec<Attempt>> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"SELECT id, session_id, candidate_id, variant_id, question_index, selected_index,
                      selected_answer, is_correct, time_taken, auto_submitted, submitted_at
               FROM attempts WHERE session_id = $1
               ORDER BY question_index"#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }
}
