//! Prompt construction and response parsing shared by the HTTP generators.
//!
//! Questions are requested one category at a time. Each call asks for a JSON
//! array of question objects; the answer may arrive wrapped in markdown.

use proctor_core::traits::{extract_json_from_markdown, GenerationRequest, QuestionSpec};

use crate::error::GenerationError;

/// Resume or context text beyond this many characters is not sent.
const MAX_CONTEXT_CHARS: usize = 2000;

/// Sampling temperature for question generation.
pub const TEMPERATURE: f64 = 0.7;

/// Completion budget for one category.
pub const MAX_TOKENS: u32 = 4096;

/// What a category's questions should cover. `None` for unknown categories.
pub fn category_description(category: &str) -> Option<&'static str> {
    match category {
        "brain_teaser" => {
            Some("Logic puzzles and problem-solving questions that test analytical thinking")
        }
        "coding" => Some("Programming challenges that require writing code to solve problems"),
        "code_review" => Some("Buggy code snippets that need to be identified and fixed"),
        "system_design" => Some("Architecture and system design questions"),
        "signal_processing" => {
            Some("Digital signal processing questions (filters, FFT, DSP algorithms)")
        }
        _ => None,
    }
}

fn difficulty_guidance(difficulty: &str) -> &str {
    match difficulty {
        "junior" => "Entry-level questions suitable for 0-2 years experience. Focus on fundamentals.",
        "mid" => "Intermediate questions for 2-5 years experience. Include some complexity.",
        "senior" => {
            "Advanced questions for 5+ years experience. Focus on architecture, optimization, and edge cases."
        }
        other => other,
    }
}

/// Number of questions requested for `category`.
pub fn questions_for(category: &str) -> usize {
    match category {
        "coding" | "system_design" => 3,
        _ => 4,
    }
}

/// The system and user messages for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPrompt {
    pub category: String,
    pub system: String,
    pub user: String,
}

/// One prompt per known category of `request`, in request order.
///
/// Unknown categories are skipped.
pub fn category_prompts(request: &GenerationRequest) -> Vec<CategoryPrompt> {
    request
        .categories
        .iter()
        .filter_map(|category| {
            let Some(description) = category_description(category) else {
                tracing::debug!(%category, "skipping unknown category");
                return None;
            };
            Some(CategoryPrompt {
                category: category.clone(),
                system: system_prompt(category, description, request),
                user: user_prompt(category, request),
            })
        })
        .collect()
}

fn system_prompt(category: &str, description: &str, request: &GenerationRequest) -> String {
    let skills = if request.skills.is_empty() {
        "General".to_string()
    } else {
        request.skills.join(", ")
    };
    let count = questions_for(category);
    format!(
        r#"You are an expert technical interviewer creating assessment questions.

Category: {description}
Difficulty: {guidance}
Candidate Skills: {skills}

Generate {count} questions for this category. Each question should be relevant to the candidate's skills when possible.

Return a JSON array of question objects with this structure:
{{
  "question_text": "The question prompt",
  "question_code": "Code snippet if applicable (for coding/code_review), null otherwise",
  "expected_answer": "Brief description of expected answer or solution approach",
  "hints": ["Optional hint 1", "Optional hint 2"]
}}

For code_review questions, include buggy code that candidates need to fix.
For system_design questions, ask about designing real systems.

Return ONLY the JSON array, no other text."#,
        guidance = difficulty_guidance(&request.difficulty),
    )
}

fn user_prompt(category: &str, request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Generate {} {} level {} questions.",
        questions_for(category),
        request.difficulty,
        category
    );
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        let truncated: String = context.chars().take(MAX_CONTEXT_CHARS).collect();
        prompt.push_str("\n\nCandidate background:\n");
        prompt.push_str(&truncated);
    }
    prompt
}

/// Parse a model response into question specs.
///
/// Accepts a bare JSON array, one inside a markdown block, or an array
/// embedded in surrounding prose.
pub fn parse_question_list(content: &str) -> Result<Vec<QuestionSpec>, GenerationError> {
    let json = extract_json_from_markdown(content);
    let questions = match serde_json::from_str::<Vec<QuestionSpec>>(&json) {
        Ok(questions) => questions,
        Err(first_error) => embedded_array(&json)
            .and_then(|slice| serde_json::from_str::<Vec<QuestionSpec>>(slice).ok())
            .ok_or_else(|| {
                GenerationError::MalformedResponse(format!(
                    "expected a JSON array of questions: {first_error}"
                ))
            })?,
    };
    if questions.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "response contained no questions".into(),
        ));
    }
    Ok(questions)
}

/// The outermost `[...]` span of `text`, if any.
fn embedded_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}
