use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(Error::Validation(format!("Unknown difficulty: {}", other))),
        }
    }
}

/// A question concept: topic and difficulty, independent of exact wording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseQuestion {
    pub id: Uuid,
    pub topic: String,
    pub difficulty: Difficulty,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One concretely-worded rendition of a base question. Only approved
/// variants are eligible for assignment to candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionVariant {
    pub id: Uuid,
    pub question_id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub correct_answer: String,
    pub approved: bool,
    pub is_generated: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QuestionVariant {
    /// Builds a variant, rejecting malformed input before it can be
    /// persisted: exactly four options, `correct_index` within 0..=3.
    pub fn new(
        question_id: Uuid,
        question_text: String,
        options: Vec<String>,
        correct_index: i32,
        is_generated: bool,
    ) -> Result<Self> {
        if options.len() != OPTION_COUNT {
            return Err(Error::Validation(format!(
                "A variant must have exactly {} options, got {}",
                OPTION_COUNT,
                options.len()
            )));
        }
        if !(0..OPTION_COUNT as i32).contains(&correct_index) {
            return Err(Error::Validation(format!(
                "correct_index must be between 0 and {}, got {}",
                OPTION_COUNT - 1,
                correct_index
            )));
        }
        let correct_answer = options[correct_index as usize].clone();

        Ok(Self {
            id: Uuid::new_v4(),
            question_id,
            question_text,
            options,
            correct_index,
            correct_answer,
            // Hand-authored variants are trusted; generated ones await review.
            approved: !is_generated,
            is_generated,
            approved_at: None,
            approved_by: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into(), "d".into()]
    }

    #[test]
    fn variant_records_correct_answer_text() {
        let v = QuestionVariant::new(Uuid::new_v4(), "Q?".into(), options(), 2, false).unwrap();
        assert_eq!(v.correct_answer, "c");
        assert!(v.approved);
    }

    #[test]
    fn generated_variant_starts_unapproved() {
        let v = QuestionVariant::new(Uuid::new_v4(), "Q?".into(), options(), 0, true).unwrap();
        assert!(!v.approved);
        assert!(v.is_generated);
    }

    #[test]
    fn rejects_wrong_option_count() {
        let err = QuestionVariant::new(
            Uuid::new_v4(),
            "Q?".into(),
            vec!["a".into(), "b".into()],
            0,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        let err = QuestionVariant::new(Uuid::new_v4(), "Q?".into(), options(), 4, false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
