//! Session state machine.
//!
//! ```text
//! Pending --start--> InProgress <--break start/end--> OnBreak
//! InProgress | OnBreak --complete--> Completed
//! InProgress --deadline passed (on read)--> Expired
//! ```
//!
//! Completed and Expired are terminal. Disqualification is an overlay kept
//! in the integrity record; it never replaces the status.

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::ledger::{self, BreakEnded};
use crate::model::{Session, SessionStatus};

/// What [`complete`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// The session moved to `Completed`. Carries the break that had to be
    /// closed first, if the candidate finished while on break.
    Completed { closed_break: Option<BreakEnded> },
    /// The session was already terminal and was left untouched.
    AlreadyFinished,
}

/// Reject candidate-facing mutations on a disqualified session.
pub fn ensure_not_disqualified(session: &Session) -> Result<(), SessionError> {
    match &session.integrity.disqualification {
        Some(disqualification) => Err(SessionError::Disqualified {
            reason: disqualification.reason.clone(),
        }),
        None => Ok(()),
    }
}

/// Start the session clock.
pub fn start(session: &mut Session, now: DateTime<Utc>) -> Result<(), SessionError> {
    if session.status != SessionStatus::Pending {
        return Err(SessionError::invalid_state("start", &session.status));
    }
    session.status = SessionStatus::InProgress;
    session.start_time = Some(now);
    session.updated_at = now;
    Ok(())
}

/// Finish the session. Idempotent on terminal sessions.
///
/// A session on break has its open break closed with the usual ledger rules
/// before it is marked completed, so no history entry is left dangling.
pub fn complete(
    session: &mut Session,
    now: DateTime<Utc>,
) -> Result<CompleteOutcome, SessionError> {
    let closed_break = match session.status {
        SessionStatus::Completed { .. } | SessionStatus::Expired { .. } => {
            return Ok(CompleteOutcome::AlreadyFinished);
        }
        SessionStatus::Pending => {
            return Err(SessionError::invalid_state("complete", &session.status));
        }
        SessionStatus::OnBreak { .. } => Some(ledger::end_break(session, now)?),
        SessionStatus::InProgress => None,
    };

    session.status = SessionStatus::Completed { at: now };
    session.updated_at = now;
    Ok(CompleteOutcome::Completed { closed_break })
}
