//! Recall survey generation.
//!
//! Builds short quizzes from the person's own memories so the caregiver can
//! see which ones are fading. Wrong answers are fed back as a weight-update
//! query by the apps.

use keepsake_common::{KeepsakeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::{LlmClient, LlmRequest};

const SURVEY_SYSTEM_PROMPT: &str = r#"You write gentle recall questions for a person living with memory loss, based on their own photos and videos.

Each memory is given as an id and a description. Write questions that can be answered from the descriptions alone: who is pictured, where it happened, what was going on. Prefer multiple choice with three or four options; yes/no questions are fine for harder memories. Keep language simple and warm.

Reply with a JSON array only. Each element has:
  "question": string
  "type": "multiple_choice" or "yes_no"
  "options": array of strings (omit for yes_no)
  "correct_answer": string
  "related_memory_ids": array of memory ids the question is about
  "difficulty": "easy", "medium" or "hard"
  "category": "people", "places", "events" or "objects""#;

/// One memory offered to the survey generator.
#[derive(Debug, Clone, Serialize)]
pub struct SurveySource {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub related_memory_ids: Vec<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_difficulty() -> String {
    "medium".into()
}

fn default_category() -> String {
    "events".into()
}

/// Generates recall questions with an LLM.
pub struct LlmSurveyGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmSurveyGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Ask for up to `max_questions` questions about `sources`.
    ///
    /// Questions that reference unknown memory ids have those ids dropped.
    pub async fn generate(
        &self,
        sources: &[SurveySource],
        max_questions: usize,
    ) -> Result<Vec<SurveyQuestion>> {
        if sources.is_empty() || max_questions == 0 {
            return Ok(Vec::new());
        }

        let listing = sources
            .iter()
            .map(|s| format!("- id: {}\n  description: {}", s.id, s.text))
            .collect::<Vec<_>>()
            .join("\n");

        let request = LlmRequest::prompt(
            SURVEY_SYSTEM_PROMPT,
            format!("Write {max_questions} questions about these memories:\n{listing}"),
        )
        .with_temperature(0.7)
        .with_max_tokens(1500);

        let response = self.client.complete(request).await?;
        let mut questions = parse_questions(&response.content)?;

        for q in &mut questions {
            let before = q.related_memory_ids.len();
            q.related_memory_ids
                .retain(|id| sources.iter().any(|s| &s.id == id));
            if q.related_memory_ids.len() != before {
                warn!(question = %q.question, "Dropped unknown memory ids from survey question");
            }
        }
        questions.truncate(max_questions);

        debug!(questions = questions.len(), "Generated survey");
        Ok(questions)
    }
}

/// Parse a JSON array of questions, tolerating Markdown code fences and text
/// around the array.
pub fn parse_questions(text: &str) -> Result<Vec<SurveyQuestion>> {
    let start = text.find('[');
    let end = text.rfind(']');

    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => {
            return Err(KeepsakeError::Parse(
                "No JSON array in survey response".to_string(),
            ));
        }
    };

    serde_json::from_str(json)
        .map_err(|e| KeepsakeError::Parse(format!("Invalid survey JSON: {e}")))
}
