//! Relevance-driven weight updates.
//!
//! Every item is scored against the query by a [`RelevanceOracle`]; the
//! clamped score is added to the stored weight. Weights only grow here and
//! come back down through post-selection decay or an explicit reset.

use crate::store::{FieldUpdate, ItemStore};
use crate::types::{ScoredItem, UpdateSummary, WeightConfig};
use futures::stream::{self, StreamExt};
use keepsake_common::{
    DEFAULT_WEIGHT, DescriptionFuser, KeepsakeError, MemoryItem, RelevanceOracle, Result,
    clamp_score,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Text an item is compared against, and the fused description behind it.
#[derive(Debug, Clone, PartialEq)]
struct ComparisonText {
    text: String,
    description: Option<String>,
}

enum ItemOutcome {
    Skipped,
    Failed,
    Updated(ScoredItem),
}

/// Applies relevance increments and resets across the whole collection.
pub struct WeightEngine {
    store: Arc<dyn ItemStore>,
    fuser: Option<Arc<dyn DescriptionFuser>>,
    config: WeightConfig,
}

impl WeightEngine {
    pub fn new(store: Arc<dyn ItemStore>, config: WeightConfig) -> Self {
        Self {
            store,
            fuser: None,
            config,
        }
    }

    /// Regenerate stale combined descriptions with `fuser` before scoring.
    pub fn with_fuser(mut self, fuser: Arc<dyn DescriptionFuser>) -> Self {
        self.fuser = Some(fuser);
        self
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.config.oracle_timeout_ms)
    }

    /// Score every item against `query` and add the clamped score to its weight.
    ///
    /// Fails as a whole only when the query is blank, the oracle is not
    /// usable, or the item list cannot be read. Per-item failures are logged
    /// and reported through `failed`.
    pub async fn update_weights(
        &self,
        query: &str,
        oracle: &dyn RelevanceOracle,
    ) -> Result<UpdateSummary> {
        let query = query.trim();
        if query.is_empty() {
            return Err(KeepsakeError::InvalidInput("Query must not be empty".into()));
        }

        oracle.ensure_available()?;

        let items = self.store.list().await?;
        let total_documents = items.len();

        info!(
            query = %query,
            total_documents = total_documents,
            "Updating weights by similarity"
        );

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(move |item| self.score_item(query, item, oracle))
            .buffered(self.config.max_concurrent_scoring.max(1))
            .collect()
            .await;

        let mut skipped_no_caption = 0;
        let mut failed = 0;
        let mut updated_images = Vec::new();
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Skipped => skipped_no_caption += 1,
                ItemOutcome::Failed => failed += 1,
                ItemOutcome::Updated(scored) => updated_images.push(scored),
            }
        }

        let mut all_scores = updated_images.clone();
        all_scores.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));

        info!(
            updated = updated_images.len(),
            skipped = skipped_no_caption,
            failed = failed,
            "Weight update finished"
        );

        Ok(UpdateSummary {
            message: format!(
                "Updated weights for {} of {} memories",
                updated_images.len(),
                total_documents
            ),
            query: query.to_string(),
            total_documents,
            skipped_no_caption,
            failed,
            updated_images,
            all_scores,
        })
    }

    async fn score_item(
        &self,
        query: &str,
        item: MemoryItem,
        oracle: &dyn RelevanceOracle,
    ) -> ItemOutcome {
        let Some(comparison) = self.comparison_text(&item).await else {
            debug!(item_id = %item.id, "No caption or description, skipping");
            return ItemOutcome::Skipped;
        };

        let relevance =
            match tokio::time::timeout(self.call_timeout(), oracle.score(query, &comparison.text))
                .await
            {
                Ok(Ok(relevance)) => relevance,
                Ok(Err(e)) => {
                    warn!(item_id = %item.id, error = %e, "Relevance scoring failed");
                    return ItemOutcome::Failed;
                }
                Err(_) => {
                    warn!(
                        item_id = %item.id,
                        timeout_ms = self.config.oracle_timeout_ms,
                        "Relevance scoring timed out"
                    );
                    return ItemOutcome::Failed;
                }
            };

        let score = clamp_score(relevance.score);
        let new_weight = item.weight + score;

        if let Err(e) = self
            .store
            .update_field(&item.id, FieldUpdate::Weight(new_weight))
            .await
        {
            warn!(item_id = %item.id, error = %e, "Failed to write updated weight");
            return ItemOutcome::Failed;
        }

        debug!(
            item_id = %item.id,
            score = score,
            old_weight = item.weight,
            new_weight = new_weight,
            "Weight updated"
        );

        ItemOutcome::Updated(ScoredItem {
            id: item.id,
            caption: item.caption,
            combined_description: comparison.description,
            similarity_score: score,
            reasoning: relevance.reasoning.unwrap_or_default(),
            old_weight: item.weight,
            new_weight,
        })
    }

    /// Pick the text to score: a fresh combined description, a regenerated
    /// one, the caption, or any leftover description, in that order.
    async fn comparison_text(&self, item: &MemoryItem) -> Option<ComparisonText> {
        if item.has_fresh_description() {
            if let Some(desc) = item.cached_description() {
                return Some(ComparisonText {
                    text: desc.to_string(),
                    description: Some(desc.to_string()),
                });
            }
        }

        let caption = item.caption.trim();
        if caption.is_empty() {
            return item.cached_description().map(|desc| ComparisonText {
                text: desc.to_string(),
                description: Some(desc.to_string()),
            });
        }

        if let Some(desc) = self.regenerate_description(item).await {
            return Some(ComparisonText {
                text: desc.clone(),
                description: Some(desc),
            });
        }

        Some(ComparisonText {
            text: caption.to_string(),
            description: None,
        })
    }

    async fn regenerate_description(&self, item: &MemoryItem) -> Option<String> {
        let fuser = self.fuser.as_ref()?;

        let fused = match tokio::time::timeout(self.call_timeout(), fuser.fuse(item)).await {
            Ok(Ok(desc)) => desc.trim().to_string(),
            Ok(Err(e)) => {
                warn!(item_id = %item.id, error = %e, "Description fusion failed, using caption");
                return None;
            }
            Err(_) => {
                warn!(item_id = %item.id, "Description fusion timed out, using caption");
                return None;
            }
        };

        if fused.is_empty() {
            warn!(item_id = %item.id, "Description fusion returned nothing, using caption");
            return None;
        }

        if let Err(e) = self
            .store
            .update_field(
                &item.id,
                FieldUpdate::CombinedDescription(Some(fused.clone())),
            )
            .await
        {
            // The description is still usable for this query.
            warn!(item_id = %item.id, error = %e, "Failed to cache combined description");
        }

        debug!(item_id = %item.id, "Regenerated combined description");
        Some(fused)
    }

    /// Put every item back to the neutral weight. Returns how many were written.
    pub async fn reset_weights(&self) -> Result<usize> {
        let items = self.store.list().await?;
        let mut updated = 0;

        for item in &items {
            match self
                .store
                .update_field(&item.id, FieldUpdate::Weight(DEFAULT_WEIGHT))
                .await
            {
                Ok(()) => updated += 1,
                Err(e) => warn!(item_id = %item.id, error = %e, "Failed to reset weight"),
            }
        }

        info!(updated = updated, total = items.len(), "Weights reset");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryItemStore;
    use async_trait::async_trait;
    use keepsake_common::Relevance;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedScore(f64);

    #[async_trait]
    impl RelevanceOracle for FixedScore {
        async fn score(&self, _query: &str, _text: &str) -> Result<Relevance> {
            Ok(Relevance::new(self.0).with_reasoning("fixed"))
        }
    }

    /// Records the texts it was asked to score.
    #[derive(Default)]
    struct RecordingOracle {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RelevanceOracle for RecordingOracle {
        async fn score(&self, _query: &str, text: &str) -> Result<Relevance> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(Relevance::new(0.2))
        }
    }

    struct CountingFuser {
        calls: AtomicUsize,
        reply: String,
    }

    #[async_trait]
    impl DescriptionFuser for CountingFuser {
        async fn fuse(&self, _item: &MemoryItem) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    async fn store_with(items: &[MemoryItem]) -> Arc<InMemoryItemStore> {
        let store = Arc::new(InMemoryItemStore::new());
        for item in items {
            store.insert(item.clone()).await.unwrap();
        }
        store
    }

    fn captioned(caption: &str, weight: f64) -> MemoryItem {
        MemoryItem::new("m.jpg", "u")
            .with_caption(caption)
            .with_weight(weight)
    }

    #[tokio::test]
    async fn test_adds_score_to_weights() {
        let items = vec![captioned("beach", 1.0), captioned("garden", 2.0)];
        let store = store_with(&items).await;
        let engine = WeightEngine::new(store.clone(), WeightConfig::default());

        let summary = engine
            .update_weights("summer", &FixedScore(0.5))
            .await
            .unwrap();

        assert_eq!(summary.total_documents, 2);
        assert_eq!(summary.updated_images.len(), 2);
        assert_eq!(summary.updated_images[0].new_weight, 1.5);
        assert_eq!(summary.updated_images[1].new_weight, 2.5);
        assert_eq!(store.get(&items[0].id).await.unwrap().unwrap().weight, 1.5);
        assert_eq!(store.get(&items[1].id).await.unwrap().unwrap().weight, 2.5);
    }

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let items = vec![captioned("beach", 1.0)];
        let store = store_with(&items).await;
        let engine = WeightEngine::new(store.clone(), WeightConfig::default());

        let summary = engine.update_weights("q", &FixedScore(1.7)).await.unwrap();
        assert_eq!(summary.updated_images[0].similarity_score, 1.0);
        assert_eq!(summary.updated_images[0].new_weight, 2.0);

        let summary = engine.update_weights("q", &FixedScore(-0.4)).await.unwrap();
        assert_eq!(summary.updated_images[0].similarity_score, 0.0);
        assert_eq!(summary.updated_images[0].new_weight, 2.0);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let store = store_with(&[captioned("beach", 1.0)]).await;
        let engine = WeightEngine::new(store, WeightConfig::default());
        let result = engine.update_weights("   ", &FixedScore(0.5)).await;
        assert!(matches!(result, Err(KeepsakeError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_store_gives_zero_summary() {
        let store = Arc::new(InMemoryItemStore::new());
        let engine = WeightEngine::new(store, WeightConfig::default());
        let summary = engine.update_weights("q", &FixedScore(0.5)).await.unwrap();
        assert_eq!(summary.total_documents, 0);
        assert!(summary.updated_images.is_empty());
        assert!(summary.all_scores.is_empty());
    }

    #[tokio::test]
    async fn test_fresh_description_preferred_over_caption() {
        let item = captioned("Dog", 1.0)
            .with_combined_description("A golden retriever asleep on the front porch");
        let store = store_with(&[item]).await;
        let engine = WeightEngine::new(store, WeightConfig::default());
        let oracle = RecordingOracle::default();

        engine.update_weights("pets", &oracle).await.unwrap();
        let seen = oracle.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["A golden retriever asleep on the front porch"]);
    }

    #[tokio::test]
    async fn test_stale_description_regenerated_and_cached() {
        let item = captioned("Dog on porch", 1.0).with_combined_description("Dog on porch");
        let store = store_with(&[item.clone()]).await;
        let fuser = Arc::new(CountingFuser {
            calls: AtomicUsize::new(0),
            reply: "Dog on porch: a golden retriever napping in the afternoon sun".into(),
        });
        let engine =
            WeightEngine::new(store.clone(), WeightConfig::default()).with_fuser(fuser.clone());
        let oracle = RecordingOracle::default();

        let summary = engine.update_weights("pets", &oracle).await.unwrap();
        assert_eq!(fuser.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            summary.updated_images[0].combined_description.as_deref(),
            Some("Dog on porch: a golden retriever napping in the afternoon sun")
        );

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert!(stored.has_fresh_description());

        // Second pass uses the cache.
        engine.update_weights("pets", &oracle).await.unwrap();
        assert_eq!(fuser.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_caption_used_without_fuser() {
        let store = store_with(&[captioned("Wedding day", 1.0)]).await;
        let engine = WeightEngine::new(store, WeightConfig::default());
        let oracle = RecordingOracle::default();

        let summary = engine.update_weights("family", &oracle).await.unwrap();
        assert_eq!(oracle.seen.lock().unwrap().clone(), vec!["Wedding day"]);
        assert!(summary.updated_images[0].combined_description.is_none());
    }

    #[tokio::test]
    async fn test_reset_weights() {
        let items = vec![
            captioned("a", 0.3),
            captioned("b", 5.0),
            captioned("c", 0.0),
        ];
        let store = store_with(&items).await;
        let engine = WeightEngine::new(store.clone(), WeightConfig::default());

        assert_eq!(engine.reset_weights().await.unwrap(), 3);
        let weights: Vec<f64> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|i| i.weight)
            .collect();
        assert_eq!(weights, vec![1.0, 1.0, 1.0]);

        assert_eq!(engine.reset_weights().await.unwrap(), 3);
        let again: Vec<f64> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|i| i.weight)
            .collect();
        assert_eq!(again, weights);
    }
}
