//! Mock generator for tests and offline runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use proctor_core::traits::{GeneratedQuestions, GenerationRequest, QuestionGenerator, QuestionSpec};

use crate::prompt::category_prompts;

/// A deterministic question generator that never leaves the process.
///
/// Produces `questions_per_category` numbered questions for every known
/// category in the request, optionally after a fixed delay.
pub struct MockGenerator {
    questions_per_category: usize,
    delay: Duration,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<GenerationRequest>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl MockGenerator {
    pub fn new(questions_per_category: usize) -> Self {
        Self {
            questions_per_category,
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of calls made to this generator.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this generator.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl QuestionGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> anyhow::Result<GeneratedQuestions> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut questions = GeneratedQuestions::default();
        for prompt in category_prompts(request) {
            let specs = (1..=self.questions_per_category)
                .map(|n| QuestionSpec {
                    question_text: format!(
                        "{} {} question {n}",
                        request.difficulty, prompt.category
                    ),
                    question_code: None,
                    expected_answer: Some(format!("Reference answer {n}")),
                    hints: vec![],
                })
                .collect();
            questions.sections.insert(prompt.category, specs);
        }
        Ok(questions)
    }
}
