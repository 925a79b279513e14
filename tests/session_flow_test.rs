use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Barrier;
use uuid::Uuid;

use assessment_backend::dto::public_dto::StartTestRequest;
use assessment_backend::error::Error;
use assessment_backend::models::attempt::Attempt;
use assessment_backend::models::candidate::Candidate;
use assessment_backend::models::question::{BaseQuestion, Difficulty, QuestionVariant};
use assessment_backend::models::session::{TestLink, TestSession};
use assessment_backend::services::scoring_service::ScoringService;
use assessment_backend::services::session_service::SessionService;
use assessment_backend::store::memory::MemoryStore;
use assessment_backend::store::Store;

async fn seed_bank(store: &MemoryStore, count: usize, approved: bool) {
    for i in 0..count {
        let base = BaseQuestion {
            id: Uuid::new_v4(),
            topic: "general".to_string(),
            difficulty: Difficulty::Medium,
            description: None,
            created_at: Utc::now(),
        };
        let mut variant = QuestionVariant::new(
            base.id,
            format!("Question {}?", i),
            vec![
                format!("q{}-a", i),
                format!("q{}-b", i),
                format!("q{}-c", i),
                format!("q{}-d", i),
            ],
            (i % 4) as i32,
            false,
        )
        .unwrap();
        variant.approved = approved;
        store.seed_question(base, vec![variant]).await;
    }
}

async fn seed_link(store: &MemoryStore, link_id: &str, total: i32, max_uses: i32) {
    let now = Utc::now();
    store
        .insert_link(&TestLink {
            link_id: link_id.to_string(),
            test_name: "Backend Assessment".to_string(),
            total_questions: total,
            time_per_question: 10,
            topics: vec![],
            max_uses,
            current_uses: 0,
            expires_at: now + Duration::hours(2),
            created_at: now,
        })
        .await
        .unwrap();
}

fn candidate(email: &str) -> StartTestRequest {
    StartTestRequest {
        name: "Alice".to_string(),
        email: email.to_string(),
        phone: None,
    }
}

/// Shuffled position that maps back to the variant's correct option.
async fn correct_shuffled_index(store: &MemoryStore, session_id: Uuid) -> i32 {
    let session = store.get_session(session_id).await.unwrap().unwrap();
    let assigned = &session.assigned_questions[session.current_index as usize];
    let variant = store
        .get_variant(assigned.variant_id)
        .await
        .unwrap()
        .unwrap();
    assigned
        .shuffle_mapping
        .iter()
        .position(|&orig| orig as i32 == variant.correct_index)
        .unwrap() as i32
}

#[tokio::test]
async fn full_session_reaches_completion() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 6, true).await;
    seed_link(&store, "test-flow", 3, 1).await;
    let service = SessionService::new(store.clone());

    let started = service
        .start_session("test-flow", &candidate("alice@example.com"), None, None)
        .await
        .unwrap();
    assert_eq!(started.total_questions, 3);
    assert_eq!(started.time_per_question, 10);

    for round in 0..3 {
        let question = service.current_question(started.session_id).await.unwrap();
        assert_eq!(question.question_number, round + 1);
        assert_eq!(question.options.len(), 4);
        assert!(question.time_remaining <= 10);

        let selection = correct_shuffled_index(&store, started.session_id).await;
        let result = service
            .submit_answer(started.session_id, Some(selection))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.test_completed, round == 2);
        assert_eq!(result.next_question.is_some(), round < 2);
    }

    let status = service.status(started.session_id).await.unwrap();
    assert!(status.completed);
    assert!(status.completed_at.is_some());
    assert_eq!(status.current_index, 3);

    let attempts = store.attempts_for_session(started.session_id).await.unwrap();
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.is_correct));
    assert!(attempts.iter().all(|a| !a.auto_submitted));
    assert!(attempts.iter().all(|a| a.time_taken <= 10.0));

    let score = ScoringService::summarize(3, &attempts);
    assert_eq!(score.score_percentage, 100.0);
}

#[tokio::test]
async fn selected_answer_is_recorded_in_canonical_text() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 2, true).await;
    seed_link(&store, "test-canonical", 1, 1).await;
    let service = SessionService::new(store.clone());

    let started = service
        .start_session("test-canonical", &candidate("canon@example.com"), None, None)
        .await
        .unwrap();

    let session = store.get_session(started.session_id).await.unwrap().unwrap();
    let assigned = session.assigned_questions[0].clone();

    service
        .submit_answer(started.session_id, Some(1))
        .await
        .unwrap();

    let attempts = store.attempts_for_session(started.session_id).await.unwrap();
    let expected = assigned.original_options[assigned.shuffle_mapping[1]].clone();
    assert_eq!(attempts[0].selected_answer.as_deref(), Some(expected.as_str()));
    assert_eq!(attempts[0].selected_index, Some(1));
}

#[tokio::test]
async fn duplicate_start_resumes_the_open_session() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 4, true).await;
    seed_link(&store, "test-resume", 2, 5).await;
    let service = SessionService::new(store.clone());

    let first = service
        .start_session("test-resume", &candidate("bob@example.com"), None, None)
        .await
        .unwrap();
    let second = service
        .start_session("test-resume", &candidate("bob@example.com"), None, None)
        .await
        .unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(second.message, "Resuming existing test session");

    // Only the first start consumed a use.
    let link = store.get_link("test-resume").await.unwrap().unwrap();
    assert_eq!(link.current_uses, 1);
}

#[tokio::test]
async fn completed_session_rejects_everything_but_status() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 2, true).await;
    seed_link(&store, "test-done", 1, 5).await;
    let service = SessionService::new(store.clone());

    let started = service
        .start_session("test-done", &candidate("carol@example.com"), None, None)
        .await
        .unwrap();
    service.submit_answer(started.session_id, None).await.unwrap();

    assert!(matches!(
        service.current_question(started.session_id).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        service.submit_answer(started.session_id, Some(0)).await,
        Err(Error::InvalidState(_))
    ));
    assert!(!service.record_distraction(started.session_id).await.unwrap());
    assert!(matches!(
        service
            .start_session("test-done", &candidate("carol@example.com"), None, None)
            .await,
        Err(Error::InvalidState(_))
    ));

    let status = service.status(started.session_id).await.unwrap();
    assert!(status.completed);
}

#[tokio::test]
async fn reading_the_question_never_advances_the_cursor() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 3, true).await;
    seed_link(&store, "test-idem", 2, 1).await;
    let service = SessionService::new(store.clone());

    let started = service
        .start_session("test-idem", &candidate("dave@example.com"), None, None)
        .await
        .unwrap();

    let first = service.current_question(started.session_id).await.unwrap();
    let second = service.current_question(started.session_id).await.unwrap();
    assert_eq!(first.variant_id, second.variant_id);
    assert_eq!(first.options, second.options);

    let session = store.get_session(started.session_id).await.unwrap().unwrap();
    assert_eq!(session.current_index, 0);
    assert!(store
        .attempts_for_session(started.session_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn distraction_events_accumulate_per_call() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 2, true).await;
    seed_link(&store, "test-tabs", 1, 1).await;
    let service = SessionService::new(store.clone());

    let started = service
        .start_session("test-tabs", &candidate("eve@example.com"), None, None)
        .await
        .unwrap();

    assert!(service.record_distraction(started.session_id).await.unwrap());
    assert!(service.record_distraction(started.session_id).await.unwrap());

    let status = service.status(started.session_id).await.unwrap();
    assert_eq!(status.distraction_count, 2);

    assert!(matches!(
        service.record_distraction(Uuid::new_v4()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn abandoned_last_question_counts_as_unanswered() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 5, true).await;
    seed_link(&store, "test-score", 3, 1).await;
    let service = SessionService::new(store.clone());

    let started = service
        .start_session("test-score", &candidate("frank@example.com"), None, None)
        .await
        .unwrap();

    for _ in 0..2 {
        let selection = correct_shuffled_index(&store, started.session_id).await;
        service
            .submit_answer(started.session_id, Some(selection))
            .await
            .unwrap();
    }
    // Question 3 times out and is never submitted.

    let attempts = store.attempts_for_session(started.session_id).await.unwrap();
    let score = ScoringService::summarize(3, &attempts);
    assert_eq!(score.correct, 2);
    assert_eq!(score.incorrect, 0);
    assert_eq!(score.unanswered, 1);
    assert_eq!(score.score_percentage, 66.67);
}

#[tokio::test]
async fn short_bank_fails_without_creating_a_session() {
    let store = Arc::new(MemoryStore::new());
    // Five bases, only three with an approved variant.
    seed_bank(&store, 3, true).await;
    seed_bank(&store, 2, false).await;
    seed_link(&store, "test-short", 5, 1).await;
    let service = SessionService::new(store.clone());

    let err = service
        .start_session("test-short", &candidate("gina@example.com"), None, None)
        .await
        .unwrap_err();
    match err {
        Error::ResourceExhausted(msg) => assert!(msg.contains("approved variants")),
        other => panic!("expected ResourceExhausted, got {:?}", other),
    }

    // Nothing was created and the link kept its use.
    let link = store.get_link("test-short").await.unwrap().unwrap();
    assert_eq!(link.current_uses, 0);
}

#[tokio::test]
async fn exhausted_and_expired_links_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    seed_bank(&store, 3, true).await;
    seed_link(&store, "test-capacity", 1, 1).await;
    let service = SessionService::new(store.clone());

    service
        .start_session("test-capacity", &candidate("henry@example.com"), None, None)
        .await
        .unwrap();
    assert!(matches!(
        service
            .start_session("test-capacity", &candidate("helen@example.com"), None, None)
            .await,
        Err(Error::ResourceExhausted(_))
    ));

    let now = Utc::now();
    store
        .insert_link(&TestLink {
            link_id: "test-expired".to_string(),
            test_name: "Old".to_string(),
            total_questions: 1,
            time_per_question: 10,
            topics: vec![],
            max_uses: 1,
            current_uses: 0,
            expires_at: now - Duration::hours(1),
            created_at: now - Duration::hours(48),
        })
        .await
        .unwrap();
    assert!(matches!(
        service
            .start_session("test-expired", &candidate("ivy@example.com"), None, None)
            .await,
        Err(Error::ResourceExhausted(_))
    ));

    assert!(matches!(
        service
            .start_session("test-missing", &candidate("jack@example.com"), None, None)
            .await,
        Err(Error::NotFound(_))
    ));
}

/// Delegating store that holds the first two session reads at a
/// barrier, forcing both racing submissions to observe the same
/// `current_index` before either may write.
struct RendezvousStore {
    inner: Arc<MemoryStore>,
    barrier: Barrier,
    reads: std::sync::atomic::AtomicU32,
}

impl RendezvousStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            reads: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Store for RendezvousStore {
    async fn get_session(&self, session_id: Uuid) -> Result<Option<TestSession>, Error> {
        let session = self.inner.get_session(session_id).await;
        let read = self
            .reads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if read < 2 {
            self.barrier.wait().await;
        }
        session
    }

    async fn find_base_questions(&self, topics: &[String]) -> Result<Vec<BaseQuestion>, Error> {
        self.inner.find_base_questions(topics).await
    }
    async fn find_approved_variants(
        &self,
        question_id: Uuid,
    ) -> Result<Vec<QuestionVariant>, Error> {
        self.inner.find_approved_variants(question_id).await
    }
    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<QuestionVariant>, Error> {
        self.inner.get_variant(variant_id).await
    }
    async fn insert_link(&self, link: &TestLink) -> Result<(), Error> {
        self.inner.insert_link(link).await
    }
    async fn get_link(&self, link_id: &str) -> Result<Option<TestLink>, Error> {
        self.inner.get_link(link_id).await
    }
    async fn list_links(&self, offset: i64, limit: i64) -> Result<Vec<TestLink>, Error> {
        self.inner.list_links(offset, limit).await
    }
    async fn delete_link(&self, link_id: &str) -> Result<bool, Error> {
        self.inner.delete_link(link_id).await
    }
    async fn increment_link_use(&self, link_id: &str) -> Result<(), Error> {
        self.inner.increment_link_use(link_id).await
    }
    async fn find_or_create_candidate(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Candidate, Error> {
        self.inner.find_or_create_candidate(name, email, phone).await
    }
    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>, Error> {
        self.inner.get_candidate(candidate_id).await
    }
    async fn insert_session(&self, session: &TestSession) -> Result<(), Error> {
        self.inner.insert_session(session).await
    }
    async fn find_session(
        &self,
        candidate_id: Uuid,
        link_id: &str,
    ) -> Result<Option<TestSession>, Error> {
        self.inner.find_session(candidate_id, link_id).await
    }
    async fn advance_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        next_start: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.inner
            .advance_session(session_id, expected_index, next_start)
            .await
    }
    async fn complete_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.inner
            .complete_session(session_id, expected_index, completed_at)
            .await
    }
    async fn record_distraction(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error> {
        self.inner.record_distraction(session_id, at).await
    }
    async fn delete_session(&self, session_id: Uuid) -> Result<bool, Error> {
        self.inner.delete_session(session_id).await
    }
    async fn list_completed_sessions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TestSession>, Error> {
        self.inner.list_completed_sessions(offset, limit).await
    }
    async fn count_completed_sessions(&self) -> Result<i64, Error> {
        self.inner.count_completed_sessions().await
    }
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), Error> {
        self.inner.insert_attempt(attempt).await
    }
    async fn attempts_for_session(&self, session_id: Uuid) -> Result<Vec<Attempt>, Error> {
        self.inner.attempts_for_session(session_id).await
    }
}

#[tokio::test]
async fn concurrent_double_submit_records_exactly_one_attempt() {
    let memory = Arc::new(MemoryStore::new());
    seed_bank(&memory, 2, true).await;
    seed_link(&memory, "test-race", 1, 1).await;

    let started = SessionService::new(memory.clone())
        .start_session("test-race", &candidate("kate@example.com"), None, None)
        .await
        .unwrap();
    let session_id = started.session_id;

    // Both submissions read the session before either writes.
    let racing = SessionService::new(Arc::new(RendezvousStore::new(memory.clone())));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let service = racing.clone();
        handles.push(tokio::spawn(async move {
            service.submit_answer(session_id, Some(0)).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(result) => {
                assert!(result.test_completed);
                successes += 1;
            }
            Err(Error::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);

    let session = memory.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(session.current_index, 1);
    assert!(session.completed);
    assert_eq!(
        memory
            .attempts_for_session(session_id)
            .await
            .unwrap()
            .len(),
        1
    );
}
