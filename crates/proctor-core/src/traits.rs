//! Collaborator traits: the question generator and the session store.
//!
//! The generator is implemented by `proctor-generation`; stores live in
//! [`crate::store`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
pub use crate::model::{GeneratedQuestions, QuestionSpec};
use crate::model::{NewSession, Session, SessionId};

// ---------------------------------------------------------------------------
// Question generator trait
// ---------------------------------------------------------------------------

/// Backend that writes the questions for a new session.
///
/// Calls may take minutes. The session service only invokes a generator
/// while it holds the candidate's generation lock, and wraps each call in a
/// timeout.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Human-readable generator name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Generate questions for every requested category.
    async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> anyhow::Result<GeneratedQuestions>;
}

/// What to generate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Section names, in presentation order.
    pub categories: Vec<String>,
    /// Difficulty label (e.g. "mid", "senior").
    pub difficulty: String,
    /// Candidate skills to tailor questions to.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Free-form context such as resume text.
    #[serde(default)]
    pub context: Option<String>,
}

// ---------------------------------------------------------------------------
// Session store trait
// ---------------------------------------------------------------------------

/// How a caller addresses a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKey {
    /// Internal id, used by administrative operations.
    Id(SessionId),
    /// Opaque access token, used by candidate operations.
    Token(String),
}

impl SessionKey {
    pub fn token(token: impl Into<String>) -> Self {
        SessionKey::Token(token.into())
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKey::Id(id) => write!(f, "id {id}"),
            // Tokens are credentials; never echo them.
            SessionKey::Token(_) => write!(f, "access token"),
        }
    }
}

/// A mutation applied to a session inside the store's atomic section.
pub type SessionMutation<'a> = dyn FnMut(&mut Session) -> Result<(), SessionError> + Send + 'a;

/// Durable session storage.
///
/// [`SessionStore::modify`] is the atomic read-modify-write primitive every
/// session operation goes through: the mutation runs against the current
/// record while no other mutation of that record can interleave, and its
/// changes are committed only if it returns `Ok`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session and assign its id.
    async fn insert(&self, new: NewSession) -> Result<Session, SessionError>;

    /// Fetch a session without modifying it.
    async fn get(&self, key: &SessionKey) -> Result<Session, SessionError>;

    /// Atomically apply `mutation` and return the committed record.
    async fn modify(
        &self,
        key: &SessionKey,
        mutation: &mut SessionMutation<'_>,
    ) -> Result<Session, SessionError>;

    /// Every stored session, newest first.
    async fn list(&self) -> Result<Vec<Session>, SessionError>;
}

// ---------------------------------------------------------------------------
// Markdown JSON extraction
// ---------------------------------------------------------------------------

/// Extract a JSON payload from a markdown-formatted LLM response.
///
/// Handles:
/// - A ```json``` block (the first one wins)
/// - Generic ``` blocks (if no json-specific block found)
/// - Raw JSON with no markdown (returned trimmed)
/// - A truncated, unclosed block (its accumulated content is used)
pub fn extract_json_from_markdown(response: &str) -> String {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else if is_generic_block {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    if in_block && !current_block.is_empty() {
        if is_json_block {
            json_blocks.push(current_block);
        } else if is_generic_block {
            generic_blocks.push(current_block);
        }
    }

    json_blocks
        .into_iter()
        .next()
        .or_else(|| generic_blocks.into_iter().next())
        .unwrap_or_else(|| response.trim().to_string())
}
