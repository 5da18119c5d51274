//! Capability traits for the external collaborators.
//!
//! These traits live in `keepsake-common` so that the weight engine and the
//! LLM adapters can both reference them without depending on each other.

use crate::{MemoryItem, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A relevance judgement for one (query, text) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    /// Raw score as reported. Callers clamp it.
    pub score: f64,

    /// Free-text explanation, if the oracle gave one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Relevance {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Scores how relevant an item's descriptive text is to a free-text query.
#[async_trait]
pub trait RelevanceOracle: Send + Sync {
    /// Check that the oracle can be used at all (credentials, configuration).
    ///
    /// Called once before a batch; an error here fails the whole batch.
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Score `text` against `query`. The score is expected in `[0, 1]`.
    async fn score(&self, query: &str, text: &str) -> Result<Relevance>;
}

/// Produces a combined description of an item from its caption and media.
#[async_trait]
pub trait DescriptionFuser: Send + Sync {
    async fn fuse(&self, item: &MemoryItem) -> Result<String>;
}
