//! LLM-backed relevance scoring.

use async_trait::async_trait;
use keepsake_common::{KeepsakeError, Relevance, RelevanceOracle, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::client::{LlmClient, LlmRequest};

const RELEVANCE_SYSTEM_PROMPT: &str = r#"You help a caregiver choose which personal memories to show a person living with memory loss.

Given a request from the caregiver and the description of one memory (a photo or video with its caption), rate how relevant the memory is to the request.

Answer with exactly two lines:
Score: <a number between 0.0 and 1.0>
Reasoning: <one short sentence>

0.0 means unrelated, 1.0 means the memory is exactly what the request is about. Judge people, places, events, objects, and feelings mentioned in either text."#;

const NUMBER: &str = r"[-+]?(?:\d+(?:\.\d*)?|\.\d+)";

static SCORE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bscore\s*[:=]\s*\**\s*({NUMBER})")).expect("valid score regex")
});

static ANY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NUMBER).expect("valid number regex"));

static REASONING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\breasoning\s*:\s*\**\s*(.*)$").expect("valid reasoning regex")
});

/// Pull a score and optional reasoning out of free-form oracle text.
///
/// A number after a `Score:` label wins; otherwise the first number anywhere
/// in the text is used. Labels are case-insensitive. The score is returned
/// as written and is not clamped.
pub fn parse_relevance(text: &str) -> Result<Relevance> {
    let raw = SCORE_LABEL
        .captures(text)
        .and_then(|c| c.get(1))
        .or_else(|| ANY_NUMBER.find(text))
        .map(|m| m.as_str())
        .ok_or_else(|| KeepsakeError::Parse(format!("No score in response: {}", preview(text))))?;

    let score: f64 = raw
        .parse()
        .map_err(|_| KeepsakeError::Parse(format!("Unreadable score '{raw}'")))?;

    let reasoning = REASONING_LABEL
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_end_matches('*').trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(Relevance { score, reasoning })
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 80 {
        format!("{}...", trimmed.chars().take(80).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

/// Scores relevance by asking an LLM and parsing its reply.
pub struct LlmRelevanceOracle {
    client: Arc<dyn LlmClient>,
}

impl LlmRelevanceOracle {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_request(query: &str, text: &str) -> LlmRequest {
        LlmRequest::prompt(
            RELEVANCE_SYSTEM_PROMPT,
            format!("Caregiver request: {query}\n\nMemory description: {text}"),
        )
        .with_temperature(0.0)
        .with_max_tokens(150)
    }
}

#[async_trait]
impl RelevanceOracle for LlmRelevanceOracle {
    async fn score(&self, query: &str, text: &str) -> Result<Relevance> {
        let response = self
            .client
            .complete(Self::build_request(query, text))
            .await?;

        debug!(
            model = %response.model,
            reply = %preview(&response.content),
            "Relevance reply"
        );

        parse_relevance(&response.content)
    }
}

/// Stand-in used when no LLM is configured. Every batch fails up front with
/// the configuration error that prevented building the real oracle.
pub struct UnavailableOracle {
    reason: String,
}

impl UnavailableOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RelevanceOracle for UnavailableOracle {
    fn ensure_available(&self) -> Result<()> {
        Err(KeepsakeError::Config(self.reason.clone()))
    }

    async fn score(&self, _query: &str, _text: &str) -> Result<Relevance> {
        Err(KeepsakeError::Config(self.reason.clone()))
    }
}
