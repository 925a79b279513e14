use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::{QuestionVariant, OPTION_COUNT};
use crate::utils::shuffle::shuffle_with_mapping;

/// The frozen, option-shuffled instance of a variant placed into one
/// candidate's session. Created once at session start, never mutated.
///
/// `shuffle_mapping[shuffled_position] = original_position`, so
/// `shuffled_options[i] == original_options[shuffle_mapping[i]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedQuestion {
    pub variant_id: Uuid,
    pub original_options: Vec<String>,
    pub shuffled_options: Vec<String>,
    pub shuffle_mapping: Vec<usize>,
}

impl AssignedQuestion {
    pub fn new(
        variant_id: Uuid,
        original_options: Vec<String>,
        shuffled_options: Vec<String>,
        shuffle_mapping: Vec<usize>,
    ) -> Result<Self> {
        if shuffled_options.len() != original_options.len()
            || shuffle_mapping.len() != original_options.len()
        {
            return Err(Error::Validation(
                "Shuffled options and mapping must match the original option count".to_string(),
            ));
        }
        if !is_permutation(&shuffle_mapping) {
            return Err(Error::Validation(format!(
                "shuffle_mapping must be a permutation of 0..{}",
                shuffle_mapping.len()
            )));
        }
        for (i, &orig) in shuffle_mapping.iter().enumerate() {
            if shuffled_options[i] != original_options[orig] {
                return Err(Error::Validation(
                    "shuffled_options disagree with shuffle_mapping".to_string(),
                ));
            }
        }

        Ok(Self {
            variant_id,
            original_options,
            shuffled_options,
            shuffle_mapping,
        })
    }

    /// Shuffles the variant's options and freezes the result.
    pub fn from_variant(variant: &QuestionVariant) -> Result<Self> {
        let original = variant.options.clone();
        let (shuffled, mapping) = shuffle_with_mapping(&original);
        Self::new(variant.id, original, shuffled, mapping)
    }

    /// Recovers the original position of a displayed option.
    pub fn original_index(&self, shuffled_index: usize) -> Result<usize> {
        self.shuffle_mapping
            .get(shuffled_index)
            .copied()
            .ok_or_else(|| {
                Error::Validation(format!(
                    "selected_index must be between 0 and {}",
                    OPTION_COUNT - 1
                ))
            })
    }
}

fn is_permutation(mapping: &[usize]) -> bool {
    let mut seen = vec![false; mapping.len()];
    for &idx in mapping {
        if idx >= mapping.len() || seen[idx] {
            return false;
        }
        seen[idx] = true;
    }
    true
}

/// One candidate's run through a test. Mutated only by the session
/// state machine; once `completed` no answer or question-start mutation
/// is permitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub link_id: String,
    pub assigned_questions: Vec<AssignedQuestion>,
    pub current_index: i32,
    /// Per-question limit in seconds, frozen from the link at creation.
    pub time_per_question: i32,
    pub question_start_time: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub distraction_events: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TestSession {
    pub fn new(
        candidate_id: Uuid,
        link_id: String,
        assigned_questions: Vec<AssignedQuestion>,
        time_per_question: i32,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate_id,
            link_id,
            assigned_questions,
            current_index: 0,
            time_per_question,
            question_start_time: now,
            started_at: now,
            completed: false,
            completed_at: None,
            ip_address,
            user_agent,
            distraction_events: Vec::new(),
            created_at: now,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.assigned_questions.len()
    }
}

/// Capacity- and time-bounded credential gating session creation.
/// `max_uses = 0` means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLink {
    pub link_id: String,
    pub test_name: String,
    pub total_questions: i32,
    pub time_per_question: i32,
    pub topics: Vec<String>,
    pub max_uses: i32,
    pub current_uses: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TestLink {
    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.current_uses >= self.max_uses
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant() -> QuestionVariant {
        QuestionVariant::new(
            Uuid::new_v4(),
            "Which keyword declares an immutable binding?".into(),
            vec!["let".into(), "mut".into(), "static".into(), "const".into()],
            0,
            false,
        )
        .unwrap()
    }

    #[test]
    fn from_variant_round_trips_every_position() {
        let v = variant();
        let aq = AssignedQuestion::from_variant(&v).unwrap();
        for s in 0..aq.shuffled_options.len() {
            let orig = aq.original_index(s).unwrap();
            assert_eq!(aq.shuffled_options[s], aq.original_options[orig]);
        }
    }

    #[test]
    fn rejects_non_permutation_mapping() {
        let v = variant();
        let err = AssignedQuestion::new(
            v.id,
            v.options.clone(),
            v.options.clone(),
            vec![0, 1, 1, 3],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rejects_mapping_disagreeing_with_options() {
        let v = variant();
        let mut shuffled = v.options.clone();
        shuffled.swap(0, 1);
        // Identity mapping no longer matches the swapped options.
        let err =
            AssignedQuestion::new(v.id, v.options.clone(), shuffled, vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn original_index_out_of_range_is_rejected() {
        let aq = AssignedQuestion::from_variant(&variant()).unwrap();
        assert!(aq.original_index(4).is_err());
    }

    #[test]
    fn link_exhaustion_and_expiry() {
        let now = Utc::now();
        let mut link = TestLink {
            link_id: "test-abc".into(),
            test_name: "Assessment".into(),
            total_questions: 5,
            time_per_question: 10,
            topics: vec![],
            max_uses: 2,
            current_uses: 0,
            expires_at: now + chrono::Duration::hours(1),
            created_at: now,
        };
        assert!(!link.is_exhausted());
        link.current_uses = 2;
        assert!(link.is_exhausted());
        link.max_uses = 0;
        assert!(!link.is_exhausted());
        assert!(!link.is_expired(now));
        assert!(link.is_expired(now + chrono::Duration::hours(2)));
    }
}
