//! Combined description generation.

use async_trait::async_trait;
use keepsake_common::{DescriptionFuser, KeepsakeError, MemoryItem, Result};
use std::sync::Arc;
use tracing::debug;

use crate::client::{LlmClient, LlmRequest};

const FUSION_SYSTEM_PROMPT: &str = r#"You write short descriptions of personal photos and videos for a memory-care app.

You receive the caregiver's caption and a link to the media. Write two or three sentences describing the memory. The caption is written by someone who knows the person and is always right: keep every name, place, date, and relationship it mentions. Add visual detail only where it does not contradict the caption.

Reply with the description only."#;

/// Fuses caption and media into one description via an LLM.
pub struct LlmDescriptionFuser {
    client: Arc<dyn LlmClient>,
}

impl LlmDescriptionFuser {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_request(item: &MemoryItem) -> LlmRequest {
        LlmRequest::prompt(
            FUSION_SYSTEM_PROMPT,
            format!(
                "Caption: {}\nMedia: {} ({})",
                item.caption.trim(),
                item.url,
                item.filename
            ),
        )
        .with_temperature(0.3)
        .with_max_tokens(300)
    }
}

#[async_trait]
impl DescriptionFuser for LlmDescriptionFuser {
    async fn fuse(&self, item: &MemoryItem) -> Result<String> {
        let response = self.client.complete(Self::build_request(item)).await?;
        let description = response.content.trim();

        if description.is_empty() {
            return Err(KeepsakeError::Oracle(format!(
                "Empty description for item '{}'",
                item.id
            )));
        }

        debug!(item_id = %item.id, chars = description.len(), "Fused description");
        Ok(description.to_string())
    }
}
