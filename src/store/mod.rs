pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::attempt::Attempt;
use crate::models::candidate::Candidate;
use crate::models::question::{BaseQuestion, QuestionVariant};
use crate::models::session::{TestLink, TestSession};

/// Persistence seam for the session engine. Session mutations are
/// conditional updates keyed on the caller's observed `current_index`,
/// so concurrent submissions against one session cannot both advance
/// it; `insert_session` and `insert_attempt` surface uniqueness
/// violations as [`crate::error::Error::Conflict`].
#[async_trait]
pub trait Store: Send + Sync {
    // --- question bank ---

    /// Base questions matching any of `topics`; all of them when empty.
    async fn find_base_questions(&self, topics: &[String]) -> Result<Vec<BaseQuestion>>;
    async fn find_approved_variants(&self, question_id: Uuid) -> Result<Vec<QuestionVariant>>;
    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<QuestionVariant>>;

    // --- test links ---

    async fn insert_link(&self, link: &TestLink) -> Result<()>;
    async fn get_link(&self, link_id: &str) -> Result<Option<TestLink>>;
    async fn list_links(&self, offset: i64, limit: i64) -> Result<Vec<TestLink>>;
    async fn delete_link(&self, link_id: &str) -> Result<bool>;
    async fn increment_link_use(&self, link_id: &str) -> Result<()>;

    // --- candidates ---

    async fn find_or_create_candidate(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Candidate>;
    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>>;

    // --- sessions ---

    /// Fails with `Conflict` if a session already exists for the
    /// session's (candidate, link) pair.
    async fn insert_session(&self, session: &TestSession) -> Result<()>;
    async fn get_session(&self, session_id: Uuid) -> Result<Option<TestSession>>;
    async fn find_session(&self, candidate_id: Uuid, link_id: &str)
        -> Result<Option<TestSession>>;
    /// Advances `current_index` by one and restarts the question timer,
    /// only if the session is open and still at `expected_index`.
    /// Returns whether a row changed.
    async fn advance_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        next_start: DateTime<Utc>,
    ) -> Result<bool>;
    /// Closes the session (same conditional contract as `advance_session`).
    async fn complete_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Appends one distraction-event timestamp; false if the session is
    /// already completed.
    async fn record_distraction(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    /// Administrative purge; cascades to the session's attempts.
    async fn delete_session(&self, session_id: Uuid) -> Result<bool>;
    async fn list_completed_sessions(&self, offset: i64, limit: i64) -> Result<Vec<TestSession>>;
    async fn count_completed_sessions(&self) -> Result<i64>;

    // --- attempts ---

    /// Fails with `Conflict` if an attempt already exists for the
    /// attempt's (session, question_index) slot.
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()>;
    /// Attempts ordered by question index.
    async fn attempts_for_session(&self, session_id: Uuid) -> Result<Vec<Attempt>>;
}
