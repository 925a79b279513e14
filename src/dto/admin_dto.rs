use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

fn default_expires_hours() -> i64 {
    72
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestLinkRequest {
    #[validate(length(min = 1, max = 200))]
    pub test_name: String,
    #[validate(range(min = 1, max = 200))]
    pub total_questions: i32,
    #[validate(range(min = 5, max = 600))]
    pub time_per_question: i32,
    pub topics: Option<Vec<String>>,
    /// 0 = unlimited.
    #[validate(range(min = 0))]
    pub max_uses: Option<i32>,
    #[serde(default = "default_expires_hours")]
    #[validate(range(min = 1, max = 720))]
    pub expires_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLinkResponse {
    pub link_id: String,
    pub test_name: String,
    pub total_questions: i32,
    pub time_per_question: i32,
    pub topics: Vec<String>,
    pub full_url: String,
    pub max_uses: i32,
    pub current_uses: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultSummary {
    pub session_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score_percentage: f64,
    pub distraction_count: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsListResponse {
    pub total: i64,
    pub results: Vec<TestResultSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultDetail {
    pub session_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_phone: Option<String>,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub unanswered: i32,
    pub score_percentage: f64,
    pub total_time_seconds: f64,
    pub average_time_per_question: f64,
    pub auto_submitted_count: i32,
    pub distraction_count: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Per-question review line: canonical (unshuffled) options with the
/// candidate's answer resolved back to original positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetail {
    pub question_index: i32,
    pub variant_id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
    pub selected_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub time_taken: f64,
    pub auto_submitted: bool,
}
