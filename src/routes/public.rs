use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::public_dto::{DistractionResponse, StartTestRequest, SubmitAnswerRequest};
use crate::AppState;

#[axum::debug_handler]
pub async fn validate_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> crate::error::Result<Response> {
    let response = state.link_service.validate_link(&link_id).await?;
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<StartTestRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;

    let ip_address = header_value(&headers, "x-forwarded-for");
    let user_agent = header_value(&headers, "user-agent");

    let response = state
        .session_service
        .start_session(&link_id, &req, ip_address, user_agent)
        .await?;
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let response = state.session_service.current_question(session_id).await?;
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;

    let response = state
        .session_service
        .submit_answer(session_id, req.selected_index)
        .await?;
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn record_distraction(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let logged = state.session_service.record_distraction(session_id).await?;
    Ok(Json(DistractionResponse { logged }).into_response())
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let response = state.session_service.status(session_id).await?;
    Ok(Json(response).into_response())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
