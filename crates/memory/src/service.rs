//! Sampling requests against the shared store.

use crate::sampler::{self, Selected};
use crate::store::{FieldUpdate, ItemStore};
use crate::types::{DecayPolicy, Draw};
use keepsake_common::Result;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Serves weighted random selections and applies post-selection decay.
pub struct SamplingService {
    store: Arc<dyn ItemStore>,
    policy: DecayPolicy,
}

impl SamplingService {
    pub fn new(store: Arc<dyn ItemStore>, policy: DecayPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> DecayPolicy {
        self.policy
    }

    /// Draw up to `k` items using the thread-local RNG.
    pub async fn draw(&self, k: usize, exclude: &[String]) -> Result<Draw> {
        let items = self.store.list().await?;
        let selected = {
            let mut rng = rand::rng();
            self.select(items, k, exclude, &mut rng)
        };
        self.finish(selected).await
    }

    /// Draw up to `k` items with a caller-supplied RNG.
    pub async fn draw_with_rng<R: Rng + Send + ?Sized>(
        &self,
        k: usize,
        exclude: &[String],
        rng: &mut R,
    ) -> Result<Draw> {
        let items = self.store.list().await?;
        let selected = self.select(items, k, exclude, rng);
        self.finish(selected).await
    }

    fn select<R: Rng + ?Sized>(
        &self,
        mut items: Vec<keepsake_common::MemoryItem>,
        k: usize,
        exclude: &[String],
        rng: &mut R,
    ) -> Vec<Selected> {
        if !exclude.is_empty() {
            let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();
            items.retain(|i| !excluded.contains(i.id.as_str()));
        }

        debug!(
            candidates = items.len(),
            k = k,
            excluded = exclude.len(),
            "Sampling memories"
        );

        sampler::sample(&items, k, rng)
    }

    /// Apply decay to the selection. Failed writes are logged and counted but
    /// never discard the selection.
    async fn finish(&self, selected: Vec<Selected>) -> Result<Draw> {
        let mut decay_failures = 0;

        if let DecayPolicy::Suppress { weight } = self.policy {
            for s in &selected {
                if let Err(e) = self
                    .store
                    .update_field(&s.item.id, FieldUpdate::Weight(weight))
                    .await
                {
                    warn!(item_id = %s.item.id, error = %e, "Failed to suppress weight");
                    decay_failures += 1;
                }
            }
        }

        info!(
            selected = selected.len(),
            decay_failures = decay_failures,
            "Served memories"
        );

        Ok(Draw {
            items: selected.iter().map(|s| s.item.view()).collect(),
            decay_failures,
        })
    }
}
