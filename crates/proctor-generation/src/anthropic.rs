//! Anthropic Messages API question generator.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use proctor_core::traits::{GeneratedQuestions, GenerationRequest, QuestionGenerator};

use crate::error::{check_status, send_error, GenerationError};
use crate::prompt::{category_prompts, parse_question_list, MAX_TOKENS, TEMPERATURE};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const API_VERSION: &str = "2023-06-01";

/// Question generator backed by the Anthropic Messages API.
pub struct AnthropicGenerator {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(api_key: &str, base_url: Option<String>, model: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.to_string(),
            client,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response, &self.model).await?;

        let api_response: MessagesResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("failed to parse response: {e}"))
        })?;
        Ok(api_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl QuestionGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
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
