//! Single-flight guard around session generation.
//!
//! Generating a session can call the question generator for minutes, far
//! too long to hold a storage lock. [`GenerationLocks`] records which
//! candidates have a generation in flight; a second request for the same
//! candidate fails immediately with [`SessionError::Conflict`] instead of
//! queueing.
//!
//! Release is tied to [`GenerationGuard`]'s `Drop`, so an error, a panic or
//! a cancelled future can never leave a candidate locked out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SessionError;
use crate::model::CandidateId;

/// Registry of candidates with a generation in flight.
///
/// Cheap to clone; clones share the same registry. Create one per service
/// and call [`GenerationLocks::shutdown`] when the service stops.
#[derive(Debug, Clone, Default)]
pub struct GenerationLocks {
    registry: Arc<Mutex<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    /// Candidate → ticket of the guard that owns the claim.
    claims: HashMap<CandidateId, u64>,
    next_ticket: u64,
}

impl GenerationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim `candidate_id`.
    pub fn try_acquire(
        &self,
        candidate_id: CandidateId,
    ) -> Result<GenerationGuard, SessionError> {
        let mut registry = self.registry();
        if registry.claims.contains_key(&candidate_id) {
            tracing::warn!(candidate_id, "generation already in progress");
            return Err(SessionError::Conflict { candidate_id });
        }
        let ticket = registry.next_ticket;
        registry.next_ticket += 1;
        registry.claims.insert(candidate_id, ticket);
        tracing::debug!(candidate_id, "generation lock acquired");
        Ok(GenerationGuard {
            locks: self.clone(),
            candidate_id,
            ticket,
        })
    }

    pub fn is_held(&self, candidate_id: CandidateId) -> bool {
        self.registry().claims.contains_key(&candidate_id)
    }

    /// Number of generations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.registry().claims.len()
    }

    fn release(&self, candidate_id: CandidateId, ticket: u64) {
        let mut registry = self.registry();
        if registry.claims.get(&candidate_id) == Some(&ticket) {
            registry.claims.remove(&candidate_id);
            tracing::debug!(candidate_id, "generation lock released");
        }
    }

    /// Drop every claim and return the candidates that still held one.
    ///
    /// Guards outstanding at shutdown become no-ops when dropped.
    pub fn shutdown(&self) -> Vec<CandidateId> {
        let mut stale: Vec<CandidateId> = self
            .registry()
            .claims
            .drain()
            .map(|(candidate_id, _)| candidate_id)
            .collect();
        stale.sort_unstable();
        if !stale.is_empty() {
            tracing::warn!(?stale, "generation locks still held at shutdown");
        }
        stale
    }
}

/// Proof of a claim in [`GenerationLocks`]. Releases the claim on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct GenerationGuard {
    locks: GenerationLocks,
    candidate_id: CandidateId,
    ticket: u64,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.locks.release(self.candidate_id, self.ticket);
    }
}
