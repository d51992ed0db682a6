//! Core data model types for proctor.
//!
//! A [`Session`] is one candidate's timed assessment attempt. Its status is a
//! tagged enum so that "on break" and "finished" carry their own timestamps
//! instead of living in nullable side fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Primary key of a session record.
pub type SessionId = u64;

/// Identifier of the candidate a session belongs to.
pub type CandidateId = u64;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, questions generated, clock not running.
    Pending,
    /// Clock running.
    InProgress,
    /// Paused; the open break started at `started_at`.
    OnBreak { started_at: DateTime<Utc> },
    /// Finished by the candidate or an administrator.
    Completed { at: DateTime<Utc> },
    /// Ran out of time. `at` is the effective deadline that passed.
    Expired { at: DateTime<Utc> },
}

impl SessionStatus {
    /// Short snake_case label, stable for display and filtering.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::OnBreak { .. } => "on_break",
            SessionStatus::Completed { .. } => "completed",
            SessionStatus::Expired { .. } => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed { .. } | SessionStatus::Expired { .. }
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in a session's break history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakEntry {
    pub start: DateTime<Utc>,
    /// `None` while the break is still open.
    pub end: Option<DateTime<Utc>>,
    /// Credited seconds; 0 while open.
    pub duration_seconds: u64,
}

/// Anti-cheat signal kinds reported by the candidate client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabSwitch,
    PasteAttempt,
    CodePaste,
    CopyAttempt,
    CodeCopy,
    RightClick,
    DevToolsOpen,
    FocusLoss,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 8] = [
        ViolationKind::TabSwitch,
        ViolationKind::PasteAttempt,
        ViolationKind::CodePaste,
        ViolationKind::CopyAttempt,
        ViolationKind::CodeCopy,
        ViolationKind::RightClick,
        ViolationKind::DevToolsOpen,
        ViolationKind::FocusLoss,
    ];

    /// Fixed contribution of one event of this kind to the violation score.
    pub fn weight(self) -> f64 {
        match self {
            ViolationKind::TabSwitch => 1.0,
            ViolationKind::PasteAttempt | ViolationKind::CodePaste => 2.0,
            ViolationKind::CopyAttempt | ViolationKind::CodeCopy => 1.0,
            ViolationKind::RightClick => 0.5,
            ViolationKind::DevToolsOpen => 3.0,
            ViolationKind::FocusLoss => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::PasteAttempt => "paste_attempt",
            ViolationKind::CodePaste => "code_paste",
            ViolationKind::CopyAttempt => "copy_attempt",
            ViolationKind::CodeCopy => "code_copy",
            ViolationKind::RightClick => "right_click",
            ViolationKind::DevToolsOpen => "dev_tools_open",
            ViolationKind::FocusLoss => "focus_loss",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ViolationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| SessionError::Validation(format!("unknown violation type: {s}")))
    }
}

/// Optional client-reported details about a copy/paste event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationMetadata {
    #[serde(default)]
    pub char_count: Option<u32>,
    #[serde(default)]
    pub line_count: Option<u32>,
}

/// A single entry in the append-only violation audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    /// Server-assigned; the only timestamp used for ordering.
    pub recorded_at: DateTime<Utc>,
    /// Whatever the client claimed, kept verbatim for review.
    #[serde(default)]
    pub client_timestamp: Option<String>,
    #[serde(default)]
    pub metadata: Option<ViolationMetadata>,
}

/// Set when the integrity monitor blocks a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disqualification {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Anti-cheat state of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    /// Per-kind counters. Kinds never seen are absent.
    #[serde(default)]
    pub counters: BTreeMap<ViolationKind, u32>,
    #[serde(default)]
    pub events: Vec<ViolationEvent>,
    #[serde(default)]
    pub violation_score: f64,
    #[serde(default)]
    pub warning_count: u32,
    #[serde(default)]
    pub disqualification: Option<Disqualification>,
}

impl IntegrityRecord {
    pub fn count(&self, kind: ViolationKind) -> u32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_disqualified(&self) -> bool {
        self.disqualification.is_some()
    }

    /// Weighted sum of the counters.
    pub fn weighted_score(&self) -> f64 {
        self.counters
            .iter()
            .map(|(kind, count)| f64::from(*count) * kind.weight())
            .sum()
    }
}

/// A single generated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub question_text: String,
    #[serde(default)]
    pub question_code: Option<String>,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Generated questions by section, in presentation order; each list is in
/// question order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedQuestions {
    pub sections: IndexMap<String, Vec<QuestionSpec>>,
}

impl GeneratedQuestions {
    /// Total number of questions across all sections.
    pub fn total(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Drop questions with blank text and sections left empty.
    pub fn without_blank_questions(mut self) -> Self {
        for questions in self.sections.values_mut() {
            questions.retain(|q| !q.question_text.trim().is_empty());
        }
        self.sections.retain(|_, questions| !questions.is_empty());
        self
    }

    /// Reorder sections to follow `order`. Sections not named in `order`
    /// keep their relative order after the named ones.
    pub fn in_section_order(mut self, order: &[String]) -> Self {
        let rank = |name: &str| order.iter().position(|o| o == name).unwrap_or(order.len());
        self.sections.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
        self
    }
}

/// One candidate's timed assessment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub candidate_id: CandidateId,
    pub access_token: String,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_hours: u32,
    /// Total break allowance, fixed at creation.
    pub allowed_break_seconds: u64,
    /// Advisory per-break cap, fixed at creation.
    pub max_single_break_seconds: u64,
    pub used_break_seconds: u64,
    pub break_count: u32,
    #[serde(default)]
    pub break_history: Vec<BreakEntry>,
    #[serde(default)]
    pub integrity: IntegrityRecord,
    /// Questions generated at creation.
    #[serde(default)]
    pub questions: GeneratedQuestions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Start of the currently open break, if any.
    pub fn current_break_start(&self) -> Option<DateTime<Utc>> {
        match self.status {
            SessionStatus::OnBreak { started_at } => Some(started_at),
            _ => None,
        }
    }

    /// When the session finished, if it has.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match self.status {
            SessionStatus::Completed { at } | SessionStatus::Expired { at } => Some(at),
            _ => None,
        }
    }

    pub fn is_on_break(&self) -> bool {
        matches!(self.status, SessionStatus::OnBreak { .. })
    }

    pub fn is_disqualified(&self) -> bool {
        self.integrity.is_disqualified()
    }
}

/// Fields the store needs to persist a freshly created session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub candidate_id: CandidateId,
    pub access_token: String,
    pub duration_hours: u32,
    pub allowed_break_seconds: u64,
    pub max_single_break_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub questions: GeneratedQuestions,
}

impl NewSession {
    /// Materialize a `Pending` session with the given primary key.
    pub fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            candidate_id: self.candidate_id,
            access_token: self.access_token,
            status: SessionStatus::Pending,
            start_time: None,
            duration_hours: self.duration_hours,
            allowed_break_seconds: self.allowed_break_seconds,
            max_single_break_seconds: self.max_single_break_seconds,
            used_break_seconds: 0,
            break_count: 0,
            break_history: Vec::new(),
            integrity: IntegrityRecord::default(),
            questions: self.questions,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Read model returned by every operation: the session plus computed timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: Session,
    pub remaining_seconds: u64,
    pub remaining_break_seconds: u64,
    pub is_on_break: bool,
    pub is_disqualified: bool,
}
