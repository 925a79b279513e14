use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::dto::public_dto::{
    QuestionResponse, SessionStatusResponse, StartTestRequest, StartTestResponse,
    SubmitAnswerResponse,
};
use crate::error::{Error, Result};
use crate::models::attempt::Attempt;
use crate::models::question::OPTION_COUNT;
use crate::models::session::TestSession;
use crate::services::question_service::QuestionService;
use crate::services::timer_service::TimerService;
use crate::store::Store;

/// Owns per-candidate test progress: session creation with a frozen
/// question set, the current-question/submit-answer cycle, distraction
/// logging, and status reads. The sole authority on whether a session
/// may still accept answers.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
    question_service: QuestionService,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let question_service = QuestionService::new(store.clone());
        Self {
            store,
            question_service,
        }
    }

    /// Starts a test for a candidate, or resumes their open session for
    /// this link. The (candidate, link) uniqueness constraint backstops
    /// concurrent duplicate starts.
    pub async fn start_session(
        &self,
        link_id: &str,
        candidate_info: &StartTestRequest,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<StartTestResponse> {
        let now = Utc::now();
        let link = self
            .store
            .get_link(link_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test link not found".to_string()))?;

        let candidate = self
            .store
            .find_or_create_candidate(
                &candidate_info.name,
                &candidate_info.email,
                candidate_info.phone.as_deref(),
            )
            .await?;

        // A duplicate start resumes the pair's session unchanged, even
        // when the link has since filled up or expired.
        if let Some(existing) = self.store.find_session(candidate.id, link_id).await? {
            return resume_response(&existing);
        }

        if link.is_exhausted() {
            return Err(Error::ResourceExhausted(
                "This test link has reached its maximum number of uses".to_string(),
            ));
        }
        if link.is_expired(now) {
            return Err(Error::ResourceExhausted(
                "This test link has expired".to_string(),
            ));
        }

        let assigned = self
            .question_service
            .assemble_set(link.total_questions as usize, &link.topics)
            .await?;

        let session = TestSession::new(
            candidate.id,
            link_id.to_string(),
            assigned,
            link.time_per_question,
            ip_address,
            user_agent,
            now,
        );

        match self.store.insert_session(&session).await {
            Ok(()) => {}
            // Lost a concurrent start for the same pair; fall back to
            // the session the winner created.
            Err(Error::Conflict(_)) => {
                let existing = self
                    .store
                    .find_session(candidate.id, link_id)
                    .await?
                    .ok_or_else(|| {
                        Error::Internal("Session vanished after duplicate start".to_string())
                    })?;
                return resume_response(&existing);
            }
            Err(other) => return Err(other),
        }

        self.store.increment_link_use(link_id).await?;

        tracing::info!(
            session_id = %session.id,
            link_id = %link_id,
            questions = session.total_questions(),
            "Test session started"
        );

        Ok(StartTestResponse {
            session_id: session.id,
            total_questions: link.total_questions,
            time_per_question: link.time_per_question,
            message: "Test started successfully".to_string(),
        })
    }

    /// Serves the question at the cursor with its shuffled options.
    /// Never exposes the correct index or the shuffle mapping, and
    /// never moves the cursor.
    pub async fn current_question(&self, session_id: Uuid) -> Result<QuestionResponse> {
        let session = self.open_session(session_id).await?;
        self.question_response(&session).await
    }

    /// Resolves one submission: timer verdict, shuffle reversal,
    /// immutable attempt, then cursor advance or completion.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        selected_index: Option<i32>,
    ) -> Result<SubmitAnswerResponse> {
        let now = Utc::now();
        let session = self.open_session(session_id).await?;

        let index = session.current_index;
        let assigned = &session.assigned_questions[index as usize];
        let variant = self
            .store
            .get_variant(assigned.variant_id)
            .await?
            .ok_or_else(|| {
                Error::Internal("Question variant missing from the bank".to_string())
            })?;

        let timer = TimerService::for_session(&session);
        let verdict = timer.validate(session.question_start_time, now);

        let mut is_correct = false;
        let mut selected_answer = None;
        let mut recorded_index = None;

        if let Some(shuffled_index) = selected_index {
            if !(0..OPTION_COUNT as i32).contains(&shuffled_index) {
                return Err(Error::Validation(format!(
                    "selected_index must be between 0 and {}",
                    OPTION_COUNT - 1
                )));
            }
            // Selections landing past the grace window are discarded:
            // the slot is recorded as an unanswered auto-submit.
            if verdict.is_valid {
                let original_index = assigned.original_index(shuffled_index as usize)?;
                selected_answer = Some(assigned.original_options[original_index].clone());
                recorded_index = Some(shuffled_index);
                is_correct = original_index as i32 == variant.correct_index;
            } else {
                tracing::warn!(
                    session_id = %session.id,
                    question_index = index,
                    exceeded_by = verdict.time_exceeded_by,
                    "Late submission beyond grace window; selection discarded"
                );
            }
        }

        let attempt = Attempt {
            id: Uuid::new_v4(),
            session_id: session.id,
            candidate_id: session.candidate_id,
            variant_id: assigned.variant_id,
            question_index: index,
            selected_index: recorded_index,
            selected_answer,
            is_correct,
            time_taken: timer.time_taken(session.question_start_time, now),
            auto_submitted: verdict.should_auto_submit,
            submitted_at: now,
        };

        self.store.insert_attempt(&attempt).await?;

        let is_last = (index + 1) as usize >= session.total_questions();
        if is_last {
            if !self.store.complete_session(session.id, index, now).await? {
                return Err(Error::Conflict(
                    "Session advanced concurrently".to_string(),
                ));
            }
            tracing::info!(session_id = %session.id, "Test session completed");
            return Ok(SubmitAnswerResponse {
                success: true,
                test_completed: true,
                next_question: None,
                message: "Test completed successfully".to_string(),
            });
        }

        if !self.store.advance_session(session.id, index, now).await? {
            return Err(Error::Conflict(
                "Session advanced concurrently".to_string(),
            ));
        }

        let next_question = self.current_question(session_id).await?;
        Ok(SubmitAnswerResponse {
            success: true,
            test_completed: false,
            next_question: Some(next_question),
            message: String::new(),
        })
    }

    /// Appends a tab-switch timestamp. Deliberately not deduplicated;
    /// returns false once the session is completed.
    pub async fn record_distraction(&self, session_id: Uuid) -> Result<bool> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        self.store.record_distraction(session_id, Utc::now()).await
    }

    /// Read-only snapshot, safe in any state including completed.
    pub async fn status(&self, session_id: Uuid) -> Result<SessionStatusResponse> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        Ok(SessionStatusResponse {
            session_id: session.id,
            candidate_id: session.candidate_id,
            current_index: session.current_index,
            total_questions: session.total_questions() as i32,
            completed: session.completed,
            started_at: session.started_at,
            completed_at: session.completed_at,
            distraction_count: session.distraction_events.len() as i32,
        })
    }

    /// Fetches a session that can still serve its current question.
    async fn open_session(&self, session_id: Uuid) -> Result<TestSession> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        if session.completed {
            return Err(Error::InvalidState("Test already completed".to_string()));
        }
        if session.current_index as usize >= session.total_questions() {
            return Err(Error::InvalidState("No more questions".to_string()));
        }
        Ok(session)
    }

    async fn question_response(&self, session: &TestSession) -> Result<QuestionResponse> {
        let index = session.current_index as usize;
        let assigned = &session.assigned_questions[index];
        let variant = self
            .store
            .get_variant(assigned.variant_id)
            .await?
            .ok_or_else(|| {
                Error::Internal("Question variant missing from the bank".to_string())
            })?;

        let timer = TimerService::for_session(session);
        let remaining = timer.remaining(session.question_start_time, Utc::now());

        Ok(QuestionResponse {
            variant_id: assigned.variant_id,
            question_text: variant.question_text,
            options: assigned.shuffled_options.clone(),
            question_number: index as i32 + 1,
            total_questions: session.total_questions() as i32,
            time_remaining: remaining,
        })
    }
}

fn resume_response(existing: &TestSession) -> Result<StartTestResponse> {
    if existing.completed {
        return Err(Error::InvalidState(
            "You have already completed this test".to_string(),
        ));
    }
    Ok(StartTestResponse {
        session_id: existing.id,
        total_questions: existing.total_questions() as i32,
        time_per_question: existing.time_per_question,
        message: "Resuming existing test session".to_string(),
    })
}
