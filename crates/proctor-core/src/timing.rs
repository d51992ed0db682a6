//! Remaining-time math and lazy expiry.
//!
//! Break time extends the deadline instead of being carved out of working
//! time:
//!
//! ```text
//! effective_deadline = start_time + duration_hours * 3600 + used_break_seconds
//! ```
//!
//! Expiry is pulled, not pushed: a session read while in progress whose
//! deadline has passed is flipped to `Expired` by [`apply_lazy_expiry`].

use chrono::{DateTime, Duration, Utc};

use crate::ledger::{remaining_budget, seconds_between};
use crate::model::{Session, SessionStatus};

/// Working time the session grants, in seconds.
pub fn duration_seconds(session: &Session) -> u64 {
    u64::from(session.duration_hours) * 3600
}

/// `at + secs`, saturating at the latest representable time.
fn add_seconds(at: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Deadline including credited break time. `None` until the session starts.
pub fn effective_deadline(session: &Session) -> Option<DateTime<Utc>> {
    let start = session.start_time?;
    let extra = duration_seconds(session).saturating_add(session.used_break_seconds);
    Some(add_seconds(start, extra))
}

/// Seconds of working time left at `now`.
///
/// While on break the open break is projected as credited up to the
/// remaining budget, so the figure stays stable during a break that fits
/// and shrinks once it overruns.
pub fn remaining_seconds(session: &Session, now: DateTime<Utc>) -> u64 {
    match session.status {
        SessionStatus::Pending => duration_seconds(session),
        SessionStatus::InProgress => effective_deadline(session)
            .map(|deadline| seconds_between(now, deadline))
            .unwrap_or(0),
        SessionStatus::OnBreak { started_at } => {
            let Some(deadline) = effective_deadline(session) else {
                return 0;
            };
            let pending_credit = seconds_between(started_at, now).min(remaining_budget(session));
            let projected = add_seconds(deadline, pending_credit);
            seconds_between(now, projected)
        }
        SessionStatus::Completed { .. } | SessionStatus::Expired { .. } => 0,
    }
}

/// Flip an in-progress session whose time is up to `Expired`.
///
/// Returns `true` if the status changed. Sessions on break are never expired
/// here; the deadline is re-evaluated after the break ends.
pub fn apply_lazy_expiry(session: &mut Session, now: DateTime<Utc>) -> bool {
    if session.status != SessionStatus::InProgress {
        return false;
    }
    let Some(deadline) = effective_deadline(session) else {
        return false;
    };
    if seconds_between(now, deadline) > 0 {
        return false;
    }

    session.status = SessionStatus::Expired { at: deadline };
    session.updated_at = now;
    tracing::debug!(session_id = session.id, %deadline, "session expired on read");
    true
}
