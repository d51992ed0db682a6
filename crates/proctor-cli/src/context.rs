//! Wiring shared by every command: config, store and service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use proctor_core::model::CandidateId;
use proctor_core::service::SessionService;
use proctor_core::store::{CandidateClaim, JsonFileSessionStore};
use proctor_core::traits::{GeneratedQuestions, GenerationRequest, QuestionGenerator};
use proctor_generation::ProctorConfig;

/// Options accepted by every subcommand.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub json: bool,
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<ProctorConfig> {
        proctor_generation::load_config_from(self.config.as_deref())
    }

    fn store_path(&self, config: &ProctorConfig) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| config.store_path.clone())
    }

    fn open_store(&self, config: &ProctorConfig) -> Result<JsonFileSessionStore> {
        let path = self.store_path(config);
        let store = JsonFileSessionStore::open(&path)
            .with_context(|| format!("failed to open session store: {}", path.display()))?;
        tracing::debug!(store = %path.display(), "session store opened");
        Ok(store)
    }

    /// Service for commands that never generate questions.
    pub fn service(&self) -> Result<SessionService> {
        let config = self.load_config()?;
        let store = self.open_store(&config)?;
        Ok(build(&config, store, Arc::new(NoGenerator)))
    }

    /// Service backed by the configured question generator, with
    /// `candidate_id` claimed against other `proctor` processes.
    pub fn generating_service(
        &self,
        candidate_id: CandidateId,
    ) -> Result<(SessionService, CandidateClaim)> {
        let config = self.load_config()?;
        let generator = proctor_generation::create_generator(&config)?;
        let store = self.open_store(&config)?;
        let claim = store.claim_candidate(candidate_id)?;
        Ok((build(&config, store, generator), claim))
    }
}

fn build(
    config: &ProctorConfig,
    store: JsonFileSessionStore,
    generator: Arc<dyn QuestionGenerator>,
) -> SessionService {
    tracing::debug!(generator = generator.name(), "service ready");
    SessionService::new(Arc::new(store), generator, config.service_config())
}

/// Stand-in for commands that only touch existing sessions.
struct NoGenerator;

#[async_trait]
impl QuestionGenerator for NoGenerator {
    fn name(&self) -> &str {
        "none"
    }

    async fn generate_questions(
        &self,
        _request: &GenerationRequest,
    ) -> anyhow::Result<GeneratedQuestions> {
        anyhow::bail!("question generation is only available to `proctor create`")
    }
}
