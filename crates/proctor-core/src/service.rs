//! Session service: the operations exposed to candidates and administrators.
//!
//! Candidate operations address a session by access token, administrative
//! ones by internal id. Every mutation runs inside [`SessionStore::modify`],
//! so the transition and all derived field updates commit together or not
//! at all.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::budget::break_budget;
use crate::clock::{Clock, SystemClock};
use crate::error::{GenerationError, SessionError};
use crate::integrity::{self, CounterReset, IntegrityPolicy, ViolationOutcome, ViolationReport};
use crate::ledger::{self, BreakEnded, BreakStarted};
use crate::lifecycle::{self, CompleteOutcome};
use crate::lock::GenerationLocks;
use crate::model::{
    CandidateId, NewSession, Session, SessionId, SessionSnapshot, ViolationKind, ViolationMetadata,
};
use crate::timing;
use crate::traits::{
    GeneratedQuestions, GenerationRequest, QuestionGenerator, SessionKey, SessionStore,
};

/// Upper bound for the backoff between generation attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Longest assessment a session may be created for.
pub const MAX_DURATION_HOURS: u32 = 24;

/// Status labels accepted by [`SessionService::list_sessions`].
pub const STATUS_LABELS: [&str; 5] = ["pending", "in_progress", "on_break", "completed", "expired"];

/// Categories that get the engineering sections.
const ENGINEERING_CATEGORIES: [&str; 5] = ["backend", "ml", "fullstack", "python", "react"];
const ENGINEERING_SECTIONS: [&str; 3] = ["coding", "code_review", "system_design"];

/// Configuration for the session service.
#[derive(Debug, Clone)]
pub struct SessionServiceConfig {
    /// Violation scoring thresholds.
    pub integrity: IntegrityPolicy,
    /// Bound on a single generator call.
    pub generation_timeout: Duration,
    /// Retries after a failed or timed-out generator call.
    pub max_generation_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_delay: Duration,
}

impl Default for SessionServiceConfig {
    fn default() -> Self {
        Self {
            integrity: IntegrityPolicy::default(),
            generation_timeout: Duration::from_secs(300),
            max_generation_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Input to [`SessionService::create_session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub candidate_id: CandidateId,
    pub duration_hours: u32,
    /// Candidate categories (e.g. "backend", "signal_processing").
    #[serde(default)]
    pub categories: Vec<String>,
    pub difficulty: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Sections generated for a candidate, in presentation order.
///
/// `brain_teaser` is always first. Engineering categories, or no categories
/// at all, add the coding sections; `signal_processing` adds its own.
pub fn sections_for(categories: &[String]) -> Vec<String> {
    let requested = |name: &str| categories.iter().any(|c| c.trim().eq_ignore_ascii_case(name));

    let mut sections = vec!["brain_teaser"];
    if categories.is_empty() || ENGINEERING_CATEGORIES.into_iter().any(requested) {
        sections.extend(ENGINEERING_SECTIONS);
    }
    if requested("signal_processing") {
        sections.push("signal_processing");
    }
    sections.into_iter().map(String::from).collect()
}

/// Build the read model for `session` as of `now`.
pub fn snapshot(session: Session, now: DateTime<Utc>) -> SessionSnapshot {
    SessionSnapshot {
        remaining_seconds: timing::remaining_seconds(&session, now),
        remaining_break_seconds: ledger::remaining_budget(&session),
        is_on_break: session.is_on_break(),
        is_disqualified: session.is_disqualified(),
        session,
    }
}

fn new_access_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Orchestrates the session lifecycle over a store and a question generator.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn QuestionGenerator>,
    clock: Arc<dyn Clock>,
    locks: GenerationLocks,
    config: SessionServiceConfig,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn QuestionGenerator>,
        config: SessionServiceConfig,
    ) -> Self {
        Self {
            store,
            generator,
            clock: Arc::new(SystemClock),
            locks: GenerationLocks::new(),
            config,
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a generation lock registry with other services.
    pub fn with_locks(mut self, locks: GenerationLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &GenerationLocks {
        &self.locks
    }

    /// Tear down the lock registry. Returns candidates whose generation was
    /// still in flight.
    pub fn shutdown(&self) -> Vec<CandidateId> {
        let stale = self.locks.shutdown();
        tracing::info!(in_flight = stale.len(), "session service shut down");
        stale
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Generate questions and create a pending session that carries them.
    ///
    /// Fails with [`SessionError::Conflict`] while another creation for the
    /// same candidate is in flight. Nothing is stored unless generation
    /// succeeds.
    #[instrument(skip(self, request), fields(candidate_id = request.candidate_id))]
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionSnapshot, SessionError> {
        if !(1..=MAX_DURATION_HOURS).contains(&request.duration_hours) {
            return Err(SessionError::Validation(format!(
                "duration_hours must be between 1 and {MAX_DURATION_HOURS}, got {}",
                request.duration_hours
            )));
        }

        let _guard = self.locks.try_acquire(request.candidate_id)?;

        let generation = GenerationRequest {
            categories: sections_for(&request.categories),
            difficulty: request.difficulty,
            skills: request.skills,
            context: request.context,
        };
        let questions = self
            .generate(&generation)
            .await?
            .in_section_order(&generation.categories);

        let budget = break_budget(f64::from(request.duration_hours));
        let now = self.clock.now();
        let session = self
            .store
            .insert(NewSession {
                candidate_id: request.candidate_id,
                access_token: new_access_token(),
                duration_hours: request.duration_hours,
                allowed_break_seconds: budget.total_seconds,
                max_single_break_seconds: budget.max_single_seconds,
                created_at: now,
                questions,
            })
            .await?;

        tracing::info!(
            session_id = session.id,
            duration_hours = session.duration_hours,
            allowed_break_seconds = session.allowed_break_seconds,
            questions = session.questions.total(),
            "session created"
        );
        Ok(snapshot(session, now))
    }

    /// Call the generator with a per-call timeout, retrying transient
    /// failures with exponential backoff.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedQuestions, SessionError> {
        let generator = self.generator.name();
        let mut retry_delay = self.config.retry_delay;
        let mut last_error = String::from("no generation attempt made");

        for attempt in 0..=self.config.max_generation_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }

            let call = self.generator.generate_questions(request);
            match tokio::time::timeout(self.config.generation_timeout, call).await {
                Ok(Ok(questions)) => {
                    let questions = questions.without_blank_questions();
                    if questions.is_empty() {
                        return Err(SessionError::Generation(format!(
                            "{generator} returned no questions"
                        )));
                    }
                    return Ok(questions);
                }
                Ok(Err(e)) => {
                    let classified = e.downcast_ref::<GenerationError>();
                    if classified.is_some_and(GenerationError::is_permanent) {
                        return Err(SessionError::Generation(format!("{e:#}")));
                    }
                    if let Some(ms) = classified.and_then(GenerationError::retry_after_ms) {
                        retry_delay = Duration::from_millis(ms);
                    }
                    tracing::warn!(attempt, generator, "question generation failed: {e:#}");
                    last_error = format!("{e:#}");
                }
                Err(_) => {
                    let secs = self.config.generation_timeout.as_secs();
                    tracing::warn!(attempt, generator, "question generation timed out");
                    last_error = format!("{generator} timed out after {secs}s");
                }
            }
        }

        Err(SessionError::Generation(last_error))
    }

    // -----------------------------------------------------------------------
    // Candidate operations
    // -----------------------------------------------------------------------

    /// Read a session, expiring it first if its time is up.
    pub async fn get_session(&self, token: &str) -> Result<SessionSnapshot, SessionError> {
        self.read(&SessionKey::token(token)).await
    }

    pub async fn start_session(&self, token: &str) -> Result<SessionSnapshot, SessionError> {
        let (session, now, ()) = self
            .candidate_mutation(token, lifecycle::start)
            .await?;
        tracing::info!(session_id = session.id, "session started");
        Ok(snapshot(session, now))
    }

    /// Finish the session. Repeating the call on a finished session returns
    /// the same snapshot without error.
    pub async fn complete_session(&self, token: &str) -> Result<SessionSnapshot, SessionError> {
        let (session, now, outcome) = self
            .candidate_mutation(token, lifecycle::complete)
            .await?;
        log_completion(&session, &outcome);
        Ok(snapshot(session, now))
    }

    pub async fn start_break(&self, token: &str) -> Result<BreakStarted, SessionError> {
        let (session, _, started) = self
            .candidate_mutation(token, ledger::start_break)
            .await?;
        tracing::info!(
            session_id = session.id,
            break_count = session.break_count,
            remaining_break_seconds = started.remaining_break_seconds,
            "break started"
        );
        Ok(started)
    }

    pub async fn end_break(&self, token: &str) -> Result<BreakEnded, SessionError> {
        let (session, _, ended) = self
            .candidate_mutation(token, ledger::end_break)
            .await?;
        tracing::info!(
            session_id = session.id,
            break_duration_seconds = ended.break_duration_seconds,
            remaining_break_seconds = ended.remaining_break_seconds,
            "break ended"
        );
        Ok(ended)
    }

    /// Record an anti-cheat signal. `kind` is validated before the session
    /// is touched; `client_timestamp` is kept for audit only.
    pub async fn record_violation(
        &self,
        token: &str,
        kind: &str,
        client_timestamp: Option<String>,
        metadata: Option<ViolationMetadata>,
    ) -> Result<ViolationOutcome, SessionError> {
        let kind: ViolationKind = kind.parse()?;
        let policy = self.config.integrity.clone();
        let (_, _, outcome) = self
            .candidate_mutation(token, |session, now| {
                let report = ViolationReport {
                    kind,
                    client_timestamp: client_timestamp.clone(),
                    metadata,
                };
                integrity::record_violation(session, report, &policy, now)
            })
            .await?;
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Administrative operations
    // -----------------------------------------------------------------------

    pub async fn get_session_by_id(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        self.read(&SessionKey::Id(id)).await
    }

    /// Clear a disqualification and put the session back in progress.
    #[instrument(skip(self))]
    pub async fn reinstate(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        let (session, now, ()) = self
            .mutate(&SessionKey::Id(id), integrity::reinstate)
            .await?;
        Ok(snapshot(session, now))
    }

    /// Zero one violation counter. The session must be in progress.
    #[instrument(skip(self))]
    pub async fn reset_counter(
        &self,
        id: SessionId,
        kind: &str,
    ) -> Result<CounterReset, SessionError> {
        let kind: ViolationKind = kind.parse()?;
        let policy = self.config.integrity.clone();
        let (_, _, reset) = self
            .mutate(&SessionKey::Id(id), |session, now| {
                timing::apply_lazy_expiry(session, now);
                integrity::reset_counter(session, kind, &policy, now)
            })
            .await?;
        tracing::info!(
            session_id = id,
            %kind,
            cleared_events = reset.cleared_events,
            "violation counter reset"
        );
        Ok(reset)
    }

    /// Complete a session on the candidate's behalf, bypassing the
    /// disqualification block.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        let (session, now, outcome) = self
            .mutate(&SessionKey::Id(id), |session, now| {
                timing::apply_lazy_expiry(session, now);
                lifecycle::complete(session, now)
            })
            .await?;
        log_completion(&session, &outcome);
        Ok(snapshot(session, now))
    }

    /// Every session, newest first, optionally filtered by status label.
    ///
    /// Overdue sessions are shown as expired; the stored records are updated
    /// on their next individual read.
    pub async fn list_sessions(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<SessionSnapshot>, SessionError> {
        let filter = match status.map(str::trim) {
            Some(label) if STATUS_LABELS.contains(&label) => Some(label),
            Some(label) => {
                return Err(SessionError::Validation(format!(
                    "unknown status filter: {label} (expected one of {})",
                    STATUS_LABELS.join(", ")
                )))
            }
            None => None,
        };

        let now = self.clock.now();
        let sessions = self.store.list().await?;
        Ok(sessions
            .into_iter()
            .map(|mut session| {
                timing::apply_lazy_expiry(&mut session, now);
                session
            })
            .filter(|session| match filter {
                Some(label) => session.status.label() == label,
                None => true,
            })
            .map(|session| snapshot(session, now))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn read(&self, key: &SessionKey) -> Result<SessionSnapshot, SessionError> {
        let (session, now, _) = self
            .mutate(key, |session, now| Ok(timing::apply_lazy_expiry(session, now)))
            .await?;
        Ok(snapshot(session, now))
    }

    /// Candidate-facing mutation: blocked on disqualified sessions, and
    /// applied after lazy expiry.
    async fn candidate_mutation<T, F>(
        &self,
        token: &str,
        mut op: F,
    ) -> Result<(Session, DateTime<Utc>, T), SessionError>
    where
        T: Send,
        F: FnMut(&mut Session, DateTime<Utc>) -> Result<T, SessionError> + Send,
    {
        self.mutate(&SessionKey::token(token), |session, now| {
            lifecycle::ensure_not_disqualified(session)?;
            timing::apply_lazy_expiry(session, now);
            op(session, now)
        })
        .await
    }

    /// Run `op` atomically against the stored record at the current time.
    async fn mutate<T, F>(
        &self,
        key: &SessionKey,
        mut op: F,
    ) -> Result<(Session, DateTime<Utc>, T), SessionError>
    where
        T: Send,
        F: FnMut(&mut Session, DateTime<Utc>) -> Result<T, SessionError> + Send,
    {
        let now = self.clock.now();
        let mut output = None;
        let session = self
            .store
            .modify(key, &mut |session| {
                output = Some(op(session, now)?);
                Ok(())
            })
            .await?;
        let output = output.ok_or_else(|| {
            SessionError::Storage("store committed without applying the mutation".into())
        })?;
        Ok((session, now, output))
    }
}

fn log_completion(session: &Session, outcome: &CompleteOutcome) {
    match outcome {
        CompleteOutcome::Completed { closed_break } => tracing::info!(
            session_id = session.id,
            closed_break = closed_break.is_some(),
            "session completed"
        ),
        CompleteOutcome::AlreadyFinished => tracing::debug!(
            session_id = session.id,
            status = %session.status,
            "session already finished"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sections_default_to_engineering() {
        assert_eq!(
            sections_for(&[]),
            vec!["brain_teaser", "coding", "code_review", "system_design"]
        );
    }

    #[test]
    fn sections_for_signal_processing_only() {
        assert_eq!(
            sections_for(&categories(&["signal_processing"])),
            vec!["brain_teaser", "signal_processing"]
        );
    }

    #[test]
    fn sections_are_not_duplicated() {
        let sections = sections_for(&categories(&["backend", "Python", "signal_processing"]));
        assert_eq!(
            sections,
            vec![
                "brain_teaser",
                "coding",
                "code_review",
                "system_design",
                "signal_processing"
            ]
        );
    }

    #[test]
    fn unknown_categories_only_get_brain_teasers() {
        assert_eq!(sections_for(&categories(&["marketing"])), vec!["brain_teaser"]);
    }

    #[test]
    fn access_tokens_are_unique_and_url_safe() {
        let a = new_access_token();
        let b = new_access_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
