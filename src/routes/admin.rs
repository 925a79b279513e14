use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::admin_dto::{
    AttemptDetail, CreateTestLinkRequest, ResultsListResponse, TestResultDetail,
    TestResultSummary,
};
use crate::error::Error;
use crate::models::session::TestSession;
use crate::services::scoring_service::ScoringService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[axum::debug_handler]
pub async fn create_test_link(
    State(state): State<AppState>,
    Json(req): Json<CreateTestLinkRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let response = state.link_service.create_link(&req).await?;
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn list_test_links(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> crate::error::Result<Response> {
    let links = state
        .link_service
        .list_links(page.offset, page.limit.clamp(1, 100))
        .await?;
    Ok(Json(links).into_response())
}

#[axum::debug_handler]
pub async fn delete_test_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> crate::error::Result<Response> {
    state.link_service.delete_link(&link_id).await?;
    Ok(Json(json!({ "message": "Test link deleted successfully" })).into_response())
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> crate::error::Result<Response> {
    let total = state.store.count_completed_sessions().await?;
    let sessions = state
        .store
        .list_completed_sessions(page.offset, page.limit.clamp(1, 100))
        .await?;

    let mut results = Vec::with_capacity(sessions.len());
    for session in sessions {
        let attempts = state.store.attempts_for_session(session.id).await?;
        let score = ScoringService::summarize(session.total_questions(), &attempts);
        let (name, email, _) = candidate_identity(&state, &session).await?;

        results.push(TestResultSummary {
            session_id: session.id,
            candidate_name: name,
            candidate_email: email,
            total_questions: score.total_questions,
            correct_answers: score.correct,
            score_percentage: score.score_percentage,
            distraction_count: session.distraction_events.len() as i32,
            completed_at: session.completed_at,
        });
    }

    Ok(Json(ResultsListResponse { total, results }).into_response())
}

#[axum::debug_handler]
pub async fn get_result_detail(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let session = state
        .store
        .get_session(session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let attempts = state.store.attempts_for_session(session.id).await?;
    let score = ScoringService::summarize(session.total_questions(), &attempts);
    let (name, email, phone) = candidate_identity(&state, &session).await?;

    let detail = TestResultDetail {
        session_id: session.id,
        candidate_name: name,
        candidate_email: email,
        candidate_phone: phone,
        total_questions: score.total_questions,
        correct_answers: score.correct,
        incorrect_answers: score.incorrect,
        unanswered: score.unanswered,
        score_percentage: score.score_percentage,
        total_time_seconds: score.total_time_seconds,
        average_time_per_question: score.average_time_per_question,
        auto_submitted_count: score.auto_submitted_count,
        distraction_count: session.distraction_events.len() as i32,
        started_at: session.started_at,
        completed_at: session.completed_at,
        ip_address: session.ip_address,
        user_agent: session.user_agent,
    };

    Ok(Json(detail).into_response())
}

#[axum::debug_handler]
pub async fn get_result_attempts(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let session = state
        .store
        .get_session(session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let attempts = state.store.attempts_for_session(session.id).await?;

    let mut details = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let Some(variant) = state.store.get_variant(attempt.variant_id).await? else {
            // Variant purged after the fact; skip rather than fail the
            // whole review.
            continue;
        };
        details.push(AttemptDetail {
            question_index: attempt.question_index,
            variant_id: variant.id,
            question_text: variant.question_text,
            options: variant.options,
            selected_answer: attempt.selected_answer,
            correct_answer: variant.correct_answer,
            is_correct: attempt.is_correct,
            time_taken: attempt.time_taken,
            auto_submitted: attempt.auto_submitted,
        });
    }

    Ok(Json(details).into_response())
}

#[axum::debug_handler]
pub async fn delete_result(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    if !state.store.delete_session(session_id).await? {
        return Err(Error::NotFound("Result not found".to_string()));
    }
    tracing::info!(session_id = %session_id, "Session purged with its attempts");
    Ok(Json(json!({ "message": "Result deleted successfully" })).into_response())
}

async fn candidate_identity(
    state: &AppState,
    session: &TestSession,
) -> crate::error::Result<(String, String, Option<String>)> {
    Ok(match state.store.get_candidate(session.candidate_id).await? {
        Some(c) => (c.name, c.email, c.phone),
        None => ("Unknown".to_string(), "unknown@example.com".to_string(), None),
    })
}
