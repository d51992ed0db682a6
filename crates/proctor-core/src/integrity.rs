//! Anti-cheat violation scoring.
//!
//! Each event bumps a per-kind counter and the score is recomputed as the
//! weighted sum of all counters. Crossing the disqualification threshold
//! blocks the session without touching its status.
//!
//! Warnings follow a fixed rule: one warning each time the cumulative score
//! crosses a multiple of `warning_threshold`. With the default threshold of
//! 3.0 a session is warned at 3.0, 6.0, 9.0 and so on, however the score got
//! there.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::ledger;
use crate::model::{
    Disqualification, IntegrityRecord, Session, SessionStatus, ViolationEvent, ViolationKind,
    ViolationMetadata,
};

/// Score thresholds for warnings and disqualification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrityPolicy {
    #[serde(default = "default_disqualification_threshold")]
    pub disqualification_threshold: f64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
}

fn default_disqualification_threshold() -> f64 {
    5.0
}

fn default_warning_threshold() -> f64 {
    3.0
}

impl Default for IntegrityPolicy {
    fn default() -> Self {
        Self {
            disqualification_threshold: default_disqualification_threshold(),
            warning_threshold: default_warning_threshold(),
        }
    }
}

impl IntegrityPolicy {
    pub fn validate(&self) -> Result<(), SessionError> {
        for (name, value) in [
            ("disqualification_threshold", self.disqualification_threshold),
            ("warning_threshold", self.warning_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SessionError::Validation(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Number of warning boundaries at or below `score`.
    fn warnings_due(&self, score: f64) -> u32 {
        (score / self.warning_threshold).floor() as u32
    }
}

/// A violation reported by the candidate client.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationReport {
    pub kind: ViolationKind,
    /// Client-declared time. Stored for audit, never used for ordering.
    pub client_timestamp: Option<String>,
    pub metadata: Option<ViolationMetadata>,
}

impl ViolationReport {
    pub fn new(kind: ViolationKind) -> Self {
        Self {
            kind,
            client_timestamp: None,
            metadata: None,
        }
    }
}

/// State of the integrity record after a violation was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationOutcome {
    pub kind: ViolationKind,
    pub counters: BTreeMap<ViolationKind, u32>,
    pub violation_score: f64,
    pub warning_count: u32,
    /// This event crossed a new warning boundary.
    pub warning_issued: bool,
    pub is_disqualified: bool,
    /// This event caused the disqualification.
    pub newly_disqualified: bool,
}

/// Ingest one violation event.
///
/// Accepted while the session clock exists (in progress or on break).
pub fn record_violation(
    session: &mut Session,
    report: ViolationReport,
    policy: &IntegrityPolicy,
    now: DateTime<Utc>,
) -> Result<ViolationOutcome, SessionError> {
    if !matches!(
        session.status,
        SessionStatus::InProgress | SessionStatus::OnBreak { .. }
    ) {
        return Err(SessionError::invalid_state(
            "record a violation",
            &session.status,
        ));
    }

    let kind = report.kind;
    let record = &mut session.integrity;
    *record.counters.entry(kind).or_insert(0) += 1;
    record.events.push(ViolationEvent {
        kind,
        recorded_at: now,
        client_timestamp: report.client_timestamp,
        metadata: report.metadata,
    });
    record.violation_score = record.weighted_score();
    let score = record.violation_score;

    let mut newly_disqualified = false;
    let mut warning_issued = false;
    if score >= policy.disqualification_threshold {
        if record.disqualification.is_none() {
            record.disqualification = Some(Disqualification {
                reason: format!(
                    "violation score {score:.1} reached disqualification threshold {:.1}",
                    policy.disqualification_threshold
                ),
                at: now,
            });
            newly_disqualified = true;
        }
    } else {
        let due = policy.warnings_due(score);
        if due > record.warning_count {
            record.warning_count = due;
            warning_issued = true;
        }
    }
    session.updated_at = now;

    let record = &session.integrity;
    if newly_disqualified {
        tracing::warn!(
            session_id = session.id,
            candidate_id = session.candidate_id,
            score,
            %kind,
            "session disqualified"
        );
    } else if warning_issued {
        tracing::info!(
            session_id = session.id,
            score,
            warnings = record.warning_count,
            "integrity warning issued"
        );
    }

    Ok(ViolationOutcome {
        kind,
        counters: record.counters.clone(),
        violation_score: score,
        warning_count: record.warning_count,
        warning_issued,
        is_disqualified: record.is_disqualified(),
        newly_disqualified,
    })
}

/// Clear a disqualification and every integrity signal, and put the session
/// back in progress whatever its status was.
///
/// An open break is closed first. A session that had not started gets its
/// clock started now. A finished session keeps its original start time, so
/// it may expire again on the next read if its deadline has passed.
pub fn reinstate(session: &mut Session, now: DateTime<Utc>) -> Result<(), SessionError> {
    if !session.is_disqualified() {
        return Err(SessionError::InvalidState {
            operation: "reinstate",
            status: "not disqualified",
        });
    }

    if session.is_on_break() {
        ledger::end_break(session, now)?;
    }
    let previous = session.status;
    session.integrity = IntegrityRecord::default();
    session.status = SessionStatus::InProgress;
    if session.start_time.is_none() {
        session.start_time = Some(now);
    }
    session.updated_at = now;

    tracing::info!(
        session_id = session.id,
        previous = %previous,
        "session reinstated"
    );
    Ok(())
}

/// What [`reset_counter`] removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterReset {
    pub kind: ViolationKind,
    pub cleared_events: u32,
    pub violation_score: f64,
    pub warning_count: u32,
}

/// Zero one violation counter and drop its events from the log.
///
/// A lighter second chance than [`reinstate`]: the warning count is brought
/// down to what the remaining score justifies, and an existing
/// disqualification stays in place.
pub fn reset_counter(
    session: &mut Session,
    kind: ViolationKind,
    policy: &IntegrityPolicy,
    now: DateTime<Utc>,
) -> Result<CounterReset, SessionError> {
    if session.status != SessionStatus::InProgress {
        return Err(SessionError::invalid_state(
            "reset a violation counter",
            &session.status,
        ));
    }

    let record = &mut session.integrity;
    let cleared = record.counters.remove(&kind).unwrap_or(0);
    record.events.retain(|event| event.kind != kind);
    record.violation_score = record.weighted_score();
    record.warning_count = record
        .warning_count
        .min(policy.warnings_due(record.violation_score));
    session.updated_at = now;

    Ok(CounterReset {
        kind,
        cleared_events: cleared,
        violation_score: session.integrity.violation_score,
        warning_count: session.integrity.warning_count,
    })
}
