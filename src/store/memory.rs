use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::attempt::Attempt;
use crate::models::candidate::Candidate;
use crate::models::question::{BaseQuestion, QuestionVariant};
use crate::models::session::{TestLink, TestSession};
use crate::store::Store;

#[derive(Default)]
struct Inner {
    base_questions: HashMap<Uuid, BaseQuestion>,
    variants: HashMap<Uuid, QuestionVariant>,
    links: HashMap<String, TestLink>,
    candidates: HashMap<Uuid, Candidate>,
    sessions: HashMap<Uuid, TestSession>,
    attempts: Vec<Attempt>,
}

/// In-memory store backing the test suite. A single `RwLock` around the
/// whole state makes every mutation atomic, which is exactly the
/// conditional-update contract the Postgres store gets from the engine.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a base question with its variants (test/bootstrap helper;
    /// question authoring itself lives outside this service).
    pub async fn seed_question(&self, base: BaseQuestion, variants: Vec<QuestionVariant>) {
        let mut inner = self.inner.write().await;
        for variant in variants {
            debug_assert_eq!(variant.question_id, base.id);
            inner.variants.insert(variant.id, variant);
        }
        inner.base_questions.insert(base.id, base);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_base_questions(&self, topics: &[String]) -> Result<Vec<BaseQuestion>> {
        let inner = self.inner.read().await;
        Ok(inner
            .base_questions
            .values()
            .filter(|q| topics.is_empty() || topics.contains(&q.topic))
            .cloned()
            .collect())
    }

    async fn find_approved_variants(&self, question_id: Uuid) -> Result<Vec<QuestionVariant>> {
        let inner = self.inner.read().await;
        Ok(inner
            .variants
            .values()
            .filter(|v| v.question_id == question_id && v.approved)
            .cloned()
            .collect())
    }

    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<QuestionVariant>> {
        Ok(self.inner.read().await.variants.get(&variant_id).cloned())
    }

    async fn insert_link(&self, link: &TestLink) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.links.contains_key(&link.link_id) {
            return Err(Error::Conflict(format!(
                "Test link {} already exists",
                link.link_id
            )));
        }
        inner.links.insert(link.link_id.clone(), link.clone());
        Ok(())
    }

    async fn get_link(&self, link_id: &str) -> Result<Option<TestLink>> {
        Ok(self.inner.read().await.links.get(link_id).cloned())
    }

    async fn list_links(&self, offset: i64, limit: i64) -> Result<Vec<TestLink>> {
        let inner = self.inner.read().await;
        let mut links: Vec<TestLink> = inner.links.values().cloned().collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn delete_link(&self, link_id: &str) -> Result<bool> {
        Ok(self.inner.write().await.links.remove(link_id).is_some())
    }

    async fn increment_link_use(&self, link_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(link) = inner.links.get_mut(link_id) {
            link.current_uses += 1;
        }
        Ok(())
    }

    async fn find_or_create_candidate(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Candidate> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.candidates.values().find(|c| c.email == email) {
            return Ok(existing.clone());
        }
        let candidate = Candidate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            created_at: Utc::now(),
        };
        inner.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        Ok(self
            .inner
            .read()
            .await
            .candidates
            .get(&candidate_id)
            .cloned())
    }

    async fn insert_session(&self, session: &TestSession) -> Result<()> {
        let mut inner = self.inner.write().await;
        let duplicate = inner
            .sessions
            .values()
            .any(|s| s.candidate_id == session.candidate_id && s.link_id == session.link_id);
        if duplicate {
            return Err(Error::Conflict(
                "A session already exists for this candidate and link".to_string(),
            ));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<TestSession>> {
        Ok(self.inner.read().await.sessions.get(&session_id).cloned())
    }

    async fn find_session(
        &self,
        candidate_id: Uuid,
        link_id: &str,
    ) -> Result<Option<TestSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.candidate_id == candidate_id && s.link_id == link_id)
            .cloned())
    }

    async fn advance_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        next_start: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&session_id) {
            Some(s) if !s.completed && s.current_index == expected_index => {
                s.current_index += 1;
                s.question_start_time = next_start;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_session(
        &self,
        session_id: Uuid,
        expected_index: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&session_id) {
            Some(s) if !s.completed && s.current_index == expected_index => {
                s.current_index += 1;
                s.completed = true;
                s.completed_at = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_distraction(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&session_id) {
            Some(s) if !s.completed => {
                s.distraction_events.push(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.sessions.remove(&session_id).is_some();
        if removed {
            inner.attempts.retain(|a| a.session_id != session_id);
        }
        Ok(removed)
    }

    async fn list_completed_sessions(&self, offset: i64, limit: i64) -> Result<Vec<TestSession>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<TestSession> = inner
            .sessions
            .values()
            .filter(|s| s.completed)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(sessions
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_completed_sessions(&self) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.values().filter(|s| s.completed).count() as i64)
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.attempts.iter().any(|a| {
            a.session_id == attempt.session_id && a.question_index == attempt.question_index
        });
        if duplicate {
            return Err(Error::Conflict(format!(
                "An attempt is already recorded for question {}",
                attempt.question_index
            )));
        }
        inner.attempts.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for_session(&self, session_id: Uuid) -> Result<Vec<Attempt>> {
        let inner = self.inner.read().await;
        let mut attempts: Vec<Attempt> = inner
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.question_index);
        Ok(attempts)
    }
}
