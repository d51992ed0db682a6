//! OpenAI Chat Completions question generator.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use proctor_core::traits::{GeneratedQuestions, GenerationRequest, QuestionGenerator};

use crate::error::{check_status, send_error, GenerationError};
use crate::prompt::{category_prompts, parse_question_list, MAX_TOKENS, TEMPERATURE};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Question generator backed by an OpenAI-compatible chat completions API.
pub struct OpenAiGenerator {
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        model: &str,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            model: model.to_string(),
            client,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");
        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response, &self.model).await?;

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("failed to parse response: {e}"))
        })?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("response had no content".into()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl QuestionGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> anyhow::Result<GeneratedQuestions> {
        let mut questions = GeneratedQuestions::default();
        for prompt in category_prompts(request) {
            let content = self.complete(&prompt.system, &prompt.user).await?;
            let specs = parse_question_list(&content)?;
            tracing::debug!(category = %prompt.category, count = specs.len(), "questions generated");
            questions.sections.insert(prompt.category, specs);
        }
        Ok(questions)
    }
}
