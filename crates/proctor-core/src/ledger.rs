//! Break ledger: spends a session's break budget.
//!
//! Overruns are never rejected. A break that lasts longer than the remaining
//! budget is credited only up to that budget; the uncredited time simply
//! comes out of working time. `break_history` keeps the full audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{BreakEntry, Session, SessionStatus};

/// Result of a successful [`start_break`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakStarted {
    pub started_at: DateTime<Utc>,
    pub remaining_break_seconds: u64,
    pub max_single_break_seconds: u64,
}

/// Result of a successful [`end_break`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakEnded {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Wall-clock length of the break.
    pub elapsed_seconds: u64,
    /// Seconds actually credited against the budget.
    pub break_duration_seconds: u64,
    pub remaining_break_seconds: u64,
    pub total_used_break_seconds: u64,
    /// The break ran past the remaining budget; the excess was not credited.
    pub exceeded_budget: bool,
    /// The break ran past the advisory single-break cap.
    pub exceeded_single_break: bool,
}

/// Break seconds still available.
pub fn remaining_budget(session: &Session) -> u64 {
    session
        .allowed_break_seconds
        .saturating_sub(session.used_break_seconds)
}

/// Whole seconds from `from` to `to`, clamped at zero.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or(0)
}

/// Pause the session clock.
pub fn start_break(
    session: &mut Session,
    now: DateTime<Utc>,
) -> Result<BreakStarted, SessionError> {
    if session.status != SessionStatus::InProgress {
        return Err(SessionError::invalid_state("start a break", &session.status));
    }
    let remaining = remaining_budget(session);
    if remaining == 0 {
        return Err(SessionError::BudgetExhausted {
            used_seconds: session.used_break_seconds,
            allowed_seconds: session.allowed_break_seconds,
        });
    }

    session.status = SessionStatus::OnBreak { started_at: now };
    session.break_count += 1;
    session.break_history.push(BreakEntry {
        start: now,
        end: None,
        duration_seconds: 0,
    });
    session.updated_at = now;

    tracing::debug!(
        session_id = session.id,
        break_count = session.break_count,
        remaining,
        "break started"
    );

    Ok(BreakStarted {
        started_at: now,
        remaining_break_seconds: remaining,
        max_single_break_seconds: session.max_single_break_seconds,
    })
}

/// Resume the session clock, crediting at most the remaining budget.
pub fn end_break(session: &mut Session, now: DateTime<Utc>) -> Result<BreakEnded, SessionError> {
    let SessionStatus::OnBreak { started_at } = session.status else {
        return Err(SessionError::invalid_state("end a break", &session.status));
    };

    let elapsed = seconds_between(started_at, now);
    let remaining_before = remaining_budget(session);
    let credited = elapsed.min(remaining_before);
    let exceeded_budget = elapsed > remaining_before;

    session.used_break_seconds += credited;
    session.status = SessionStatus::InProgress;
    match session.break_history.last_mut() {
        Some(entry) if entry.end.is_none() => {
            entry.end = Some(now);
            entry.duration_seconds = credited;
        }
        // Open entry missing from a legacy record: write a closed one so the
        // history still sums to used_break_seconds.
        _ => session.break_history.push(BreakEntry {
            start: started_at,
            end: Some(now),
            duration_seconds: credited,
        }),
    }
    session.updated_at = now;

    if exceeded_budget {
        tracing::warn!(
            session_id = session.id,
            elapsed,
            credited,
            "break exceeded remaining budget, overrun not credited"
        );
    }

    Ok(BreakEnded {
        started_at,
        ended_at: now,
        elapsed_seconds: elapsed,
        break_duration_seconds: credited,
        remaining_break_seconds: remaining_budget(session),
        total_used_break_seconds: session.used_break_seconds,
        exceeded_budget,
        exceeded_single_break: elapsed > session.max_single_break_seconds,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::NewSession;

    fn in_progress(allowed: u64, now: DateTime<Utc>) -> Session {
        let mut session = NewSession {
            candidate_id: 1,
            access_token: "tok".into(),
            duration_hours: 4,
            allowed_break_seconds: allowed,
            max_single_break_seconds: 900,
            created_at: now,
            questions: Default::default(),
        }
        .into_session(1);
        session.status = SessionStatus::InProgress;
        session.start_time = Some(now);
        session
    }

    fn history_total(session: &Session) -> u64 {
        session.break_history.iter().map(|b| b.duration_seconds).sum()
    }

    #[test]
    fn start_then_end_credits_elapsed() {
        let t0 = Utc::now();
        let mut session = in_progress(1800, t0);

        let started = start_break(&mut session, t0).unwrap();
        assert_eq!(started.remaining_break_seconds, 1800);
        assert_eq!(started.max_single_break_seconds, 900);
        assert_eq!(session.current_break_start(), Some(t0));
        assert_eq!(session.break_count, 1);
        assert_eq!(session.break_history.last().unwrap().end, None);

        let ended = end_break(&mut session, t0 + Duration::seconds(300)).unwrap();
        assert_eq!(ended.break_duration_seconds, 300);
        assert_eq!(ended.remaining_break_seconds, 1500);
        assert!(!ended.exceeded_budget);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.used_break_seconds, 300);
        assert_eq!(history_total(&session), 300);
    }

    #[test]
    fn overrun_is_capped_at_remaining_budget() {
        let t0 = Utc::now();
        let mut session = in_progress(600, t0);
        session.used_break_seconds = 400;

        start_break(&mut session, t0).unwrap();
        let ended = end_break(&mut session, t0 + Duration::seconds(1000)).unwrap();

        assert_eq!(ended.elapsed_seconds, 1000);
        assert_eq!(ended.break_duration_seconds, 200);
        assert!(ended.exceeded_budget);
        assert!(ended.exceeded_single_break);
        assert_eq!(session.used_break_seconds, 600);
        assert_eq!(session.status, SessionStatus::InProgress);
    }

    #[test]
    fn exhausted_budget_rejects_new_break() {
        let t0 = Utc::now();
        let mut session = in_progress(600, t0);
        session.used_break_seconds = 600;
        let before = session.clone();

        let err = start_break(&mut session, t0).unwrap_err();
        assert!(matches!(err, SessionError::BudgetExhausted { .. }));
        assert_eq!(session, before);
    }

    #[test]
    fn wrong_state_leaves_session_unchanged() {
        let t0 = Utc::now();
        let mut session = in_progress(600, t0);
        let before = session.clone();

        let err = end_break(&mut session, t0).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(session, before);

        start_break(&mut session, t0).unwrap();
        let on_break = session.clone();
        let err = start_break(&mut session, t0).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(session, on_break);
    }

    #[test]
    fn history_always_sums_to_used() {
        let t0 = Utc::now();
        let mut session = in_progress(900, t0);
        let mut now = t0;

        for length in [120, 45, 400, 900, 10] {
            if start_break(&mut session, now).is_err() {
                break;
            }
            now += Duration::seconds(length);
            end_break(&mut session, now).unwrap();
            assert_eq!(history_total(&session), session.used_break_seconds);
            assert!(session.used_break_seconds <= session.allowed_break_seconds);
            now += Duration::seconds(60);
        }
        assert_eq!(session.used_break_seconds, 900);
        assert_eq!(session.break_count, 4);
    }

    #[test]
    fn clock_skew_credits_nothing() {
        let t0 = Utc::now();
        let mut session = in_progress(900, t0);
        start_break(&mut session, t0).unwrap();
        let ended = end_break(&mut session, t0 - Duration::seconds(5)).unwrap();
        assert_eq!(ended.break_duration_seconds, 0);
    }
}
