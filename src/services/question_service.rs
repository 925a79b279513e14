use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::models::session::AssignedQuestion;
use crate::store::Store;

/// Builds the frozen question set for a new session (invoked exactly
/// once, at session creation). Assembly is all-or-nothing: either the
/// full requested count is produced or the whole set fails.
#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn Store>,
}

impl QuestionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn assemble_set(
        &self,
        total: usize,
        topics: &[String],
    ) -> Result<Vec<AssignedQuestion>> {
        let base_questions = self.store.find_base_questions(topics).await?;

        if base_questions.len() < total {
            return Err(Error::ResourceExhausted(format!(
                "Not enough questions available. Need {}, found {}",
                total,
                base_questions.len()
            )));
        }

        // Uniform sample without replacement, then one approved variant
        // per base question. Bases with no approved variant are skipped,
        // which can only shrink the set below `total` and fail below.
        // RNG handles stay statement-local so the future remains Send.
        let selected: Vec<_> = base_questions
            .choose_multiple(&mut thread_rng(), total)
            .cloned()
            .collect();

        let mut assigned = Vec::with_capacity(total);
        for base in &selected {
            let variants = self.store.find_approved_variants(base.id).await?;
            let Some(variant) = variants.choose(&mut thread_rng()).cloned() else {
                continue;
            };

            assigned.push(AssignedQuestion::from_variant(&variant)?);
        }

        if assigned.len() < total {
            return Err(Error::ResourceExhausted(format!(
                "Not enough approved variants. Need {}, found {}",
                total,
                assigned.len()
            )));
        }

        // Question order varies per candidate too, independently of the
        // per-question option shuffle.
        assigned.shuffle(&mut thread_rng());

        Ok(assigned)
    }
}
