use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable record of one answered-or-skipped question slot.
/// Exactly one per (session, question_index); never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub session_id: Uuid,
    pub candidate_id: Uuid,
    pub variant_id: Uuid,
    pub question_index: i32,
    pub selected_index: Option<i32>,
    /// Canonical option text (original order), shuffle-independent.
    pub selected_answer: Option<String>,
    pub is_correct: bool,
    /// Seconds, capped at the session's per-question limit.
    pub time_taken: f64,
    pub auto_submitted: bool,
    pub submitted_at: DateTime<Utc>,
}
