use chrono::{DateTime, Utc};

use crate::models::session::TestSession;

/// Fixed tolerance for network latency. Grace never extends the hard
/// limit, only the window in which a late submission is still accepted.
pub const GRACE_PERIOD_SECONDS: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerVerdict {
    /// Seconds since the question was shown, rounded to 2 decimals.
    pub elapsed: f64,
    /// Within `max_seconds + grace_seconds`.
    pub is_valid: bool,
    /// Strictly past the hard limit.
    pub should_auto_submit: bool,
    pub time_exceeded_by: f64,
}

/// Server-authoritative per-question timer. Every computation takes the
/// caller's single clock reading; client-claimed elapsed values are
/// never consulted.
#[derive(Debug, Clone, Copy)]
pub struct TimerService {
    max_seconds: f64,
    grace_seconds: f64,
}

impl TimerService {
    pub fn new(max_seconds: f64) -> Self {
        Self {
            max_seconds,
            grace_seconds: GRACE_PERIOD_SECONDS,
        }
    }

    /// Timer for a session, using the limit frozen at session creation.
    pub fn for_session(session: &TestSession) -> Self {
        Self::new(session.time_per_question as f64)
    }

    pub fn max_seconds(&self) -> f64 {
        self.max_seconds
    }

    pub fn validate(&self, start_time: DateTime<Utc>, now: DateTime<Utc>) -> TimerVerdict {
        let elapsed = elapsed_seconds(start_time, now);

        TimerVerdict {
            elapsed: round2(elapsed),
            is_valid: elapsed <= self.max_seconds + self.grace_seconds,
            should_auto_submit: elapsed > self.max_seconds,
            time_exceeded_by: round2((elapsed - self.max_seconds).max(0.0)),
        }
    }

    /// Whole seconds left on the question, 0 once expired.
    pub fn remaining(&self, start_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let remaining = self.max_seconds - elapsed_seconds(start_time, now);
        remaining.max(0.0).floor() as i64
    }

    /// Seconds to persist for an attempt, capped at the limit so a late
    /// auto-submit never records more than the nominal maximum.
    pub fn time_taken(&self, start_time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        elapsed_seconds(start_time, now).min(self.max_seconds)
    }
}

fn elapsed_seconds(start_time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - start_time).num_milliseconds() as f64 / 1000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
