use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::dto::admin_dto::{CreateTestLinkRequest, TestLinkResponse};
use crate::dto::public_dto::ValidateLinkResponse;
use crate::error::{Error, Result};
use crate::models::session::TestLink;
use crate::store::Store;
use crate::utils::token::generate_link_token;

const LINK_TOKEN_LENGTH: usize = 12;

/// Issues and manages the single-purpose links candidates start tests
/// from. The session engine only ever reads links through the store.
#[derive(Clone)]
pub struct LinkService {
    store: Arc<dyn Store>,
    base_url: String,
}

impl LinkService {
    pub fn new(store: Arc<dyn Store>, base_url: String) -> Self {
        Self { store, base_url }
    }

    pub async fn create_link(&self, req: &CreateTestLinkRequest) -> Result<TestLinkResponse> {
        let now = Utc::now();
        let link = TestLink {
            link_id: format!("test-{}", generate_link_token(LINK_TOKEN_LENGTH)),
            test_name: req.test_name.clone(),
            total_questions: req.total_questions,
            time_per_question: req.time_per_question,
            topics: req.topics.clone().unwrap_or_default(),
            max_uses: req.max_uses.unwrap_or(1),
            current_uses: 0,
            expires_at: now + Duration::hours(req.expires_hours),
            created_at: now,
        };

        self.store.insert_link(&link).await?;
        tracing::info!(link_id = %link.link_id, "Test link created");

        Ok(self.to_response(link))
    }

    /// Public pre-flight check; reports the same exhaustion/expiry
    /// errors a start attempt would hit, without creating anything.
    pub async fn validate_link(&self, link_id: &str) -> Result<ValidateLinkResponse> {
        let link = self
            .store
            .get_link(link_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test link not found".to_string()))?;

        if link.is_exhausted() {
            return Err(Error::ResourceExhausted(
                "This test link has reached its maximum number of uses".to_string(),
            ));
        }
        if link.is_expired(Utc::now()) {
            return Err(Error::ResourceExhausted(
                "This test link has expired".to_string(),
            ));
        }

        Ok(ValidateLinkResponse {
            valid: true,
            test_name: link.test_name,
            total_questions: link.total_questions,
            time_per_question: link.time_per_question,
            topics: link.topics,
        })
    }

    pub async fn list_links(&self, offset: i64, limit: i64) -> Result<Vec<TestLinkResponse>> {
        let links = self.store.list_links(offset, limit).await?;
        Ok(links.into_iter().map(|l| self.to_response(l)).collect())
    }

    pub async fn delete_link(&self, link_id: &str) -> Result<()> {
        if !self.store.delete_link(link_id).await? {
            return Err(Error::NotFound("Test link not found".to_string()));
        }
        Ok(())
    }

    fn to_response(&self, link: TestLink) -> TestLinkResponse {
        let full_url = format!("{}/test/{}", self.base_url, link.link_id);
        TestLinkResponse {
            link_id: link.link_id,
            test_name: link.test_name,
            total_questions: link.total_questions,
            time_per_question: link.time_per_question,
            topics: link.topics,
            full_url,
            max_uses: link.max_uses,
            current_uses: link.current_uses,
            expires_at: link.expires_at,
            created_at: link.created_at,
        }
    }
}
