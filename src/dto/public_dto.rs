use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateLinkResponse {
    pub valid: bool,
    pub test_name: String,
    pub total_questions: i32,
    pub time_per_question: i32,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StartTestRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTestResponse {
    pub session_id: Uuid,
    pub total_questions: i32,
    pub time_per_question: i32,
    pub message: String,
}

/// What the candidate sees: shuffled options only, never the correct
/// index or the shuffle mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub variant_id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
    pub question_number: i32,
    pub total_questions: i32,
    pub time_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    /// Position in the displayed (shuffled) order; null when the timer
    /// ran out with nothing chosen.
    #[validate(range(min = 0, max = 3))]
    pub selected_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub success: bool,
    pub test_completed: bool,
    pub next_question: Option<QuestionResponse>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistractionResponse {
    pub logged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub candidate_id: Uuid,
    pub current_index: i32,
    pub total_questions: i32,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub distraction_count: i32,
}
