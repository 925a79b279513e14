use crate::models::attempt::Attempt;

/// Read-side aggregation over a session's attempts. Pure; no state.
pub struct ScoringService;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionScore {
    pub total_questions: i32,
    pub correct: i32,
    pub incorrect: i32,
    pub unanswered: i32,
    pub score_percentage: f64,
    pub total_time_seconds: f64,
    pub average_time_per_question: f64,
    pub auto_submitted_count: i32,
}

impl ScoringService {
    pub fn summarize(total_questions: usize, attempts: &[Attempt]) -> SessionScore {
        let correct = attempts.iter().filter(|a| a.is_correct).count();
        let incorrect = attempts
            .iter()
            .filter(|a| a.selected_answer.is_some() && !a.is_correct)
            .count();
        let unanswered = total_questions.saturating_sub(attempts.len());
        let auto_submitted = attempts.iter().filter(|a| a.auto_submitted).count();

        let total_time: f64 = attempts.iter().map(|a| a.time_taken).sum();
        let average_time = if attempts.is_empty() {
            0.0
        } else {
            total_time / attempts.len() as f64
        };

        SessionScore {
            total_questions: total_questions as i32,
            correct: correct as i32,
            incorrect: incorrect as i32,
            unanswered: unanswered as i32,
            score_percentage: Self::score_percentage(correct, total_questions),
            total_time_seconds: round2(total_time),
            average_time_per_question: round2(average_time),
            auto_submitted_count: auto_submitted as i32,
        }
    }

    pub fn score_percentage(correct: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        round2(correct as f64 / total as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
